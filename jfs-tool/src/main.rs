//! jumbo-fs image tool: format, pack and explore disk images
mod shell;

use jumbo_fs::{BitmapStore, BlockDevice, BlockId, DataBlock, DeviceError, FsError, JumboFileSystem, BLOCK_SZ};

use anyhow::Context;
use clap::{App, AppSettings, Arg, SubCommand};
use log::{info, warn};
use std::fs::{read_dir, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::{Arc, Mutex};

const DEFAULT_BLOCKS: &str = "4096";

/// A disk image on the host file system, seen as a block device
struct BlockFile(Mutex<File>);

fn io_error(err: io::Error) -> DeviceError {
    DeviceError::Io(err.to_string())
}

impl BlockFile {
    fn seek_to(file: &mut File, block_id: BlockId) -> Result<(), DeviceError> {
        file.seek(SeekFrom::Start(block_id as u64 * BLOCK_SZ as u64))
            .map_err(io_error)?;
        Ok(())
    }
}

impl BlockDevice for BlockFile {
    fn read_block(&self, block_id: BlockId, buf: &mut DataBlock) -> Result<(), DeviceError> {
        let mut file = self.0.lock().map_err(|_| DeviceError::Io("image lock poisoned".into()))?;
        Self::seek_to(&mut file, block_id)?;
        file.read_exact(buf).map_err(|err| match err.kind() {
            io::ErrorKind::UnexpectedEof => DeviceError::OutOfRange(block_id),
            _ => io_error(err),
        })
    }

    fn write_block(&self, block_id: BlockId, buf: &DataBlock) -> Result<(), DeviceError> {
        let mut file = self.0.lock().map_err(|_| DeviceError::Io("image lock poisoned".into()))?;
        Self::seek_to(&mut file, block_id)?;
        file.write_all(buf).map_err(io_error)
    }

    fn flush(&self) -> Result<(), DeviceError> {
        let file = self.0.lock().map_err(|_| DeviceError::Io("image lock poisoned".into()))?;
        file.sync_all().map_err(io_error)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let image_arg = || {
        Arg::with_name("image")
            .short("i")
            .long("image")
            .takes_value(true)
            .required(true)
            .help("Disk image file")
    };
    let matches = App::new("jumbo-fs image tool")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("mkfs")
                .about("Create a new, empty image")
                .arg(image_arg())
                .arg(
                    Arg::with_name("blocks")
                        .short("b")
                        .long("blocks")
                        .takes_value(true)
                        .default_value(DEFAULT_BLOCKS)
                        .help("Number of blocks in the image"),
                ),
        )
        .subcommand(
            SubCommand::with_name("pack")
                .about("Copy the files of a host directory into the image root")
                .arg(
                    Arg::with_name("source")
                        .short("s")
                        .long("source")
                        .takes_value(true)
                        .required(true)
                        .help("Host source dir"),
                )
                .arg(image_arg()),
        )
        .subcommand(
            SubCommand::with_name("shell")
                .about("Run shell commands read from stdin against the image")
                .arg(image_arg()),
        )
        .get_matches();

    match matches.subcommand() {
        ("mkfs", Some(args)) => {
            let blocks: u32 = args
                .value_of("blocks")
                .unwrap_or(DEFAULT_BLOCKS)
                .parse()
                .context("--blocks must be a number")?;
            mkfs(image_path(args)?, blocks)?;
        }
        ("pack", Some(args)) => {
            let source = args.value_of("source").context("missing --source")?;
            pack(source, image_path(args)?)?;
        }
        ("shell", Some(args)) => {
            let store = open_image(image_path(args)?)?;
            let mut fs = JumboFileSystem::mount(store.clone())?;
            let stdin = io::stdin();
            shell::run(&mut fs, &store, stdin.lock(), io::stdout())?;
            fs.unmount()?;
        }
        _ => unreachable!("clap requires a subcommand"),
    }
    Ok(())
}

fn image_path<'a>(args: &'a clap::ArgMatches) -> anyhow::Result<&'a str> {
    args.value_of("image").context("missing --image")
}

/// Create (or overwrite) `image` and format it
fn mkfs(image: &str, total_blocks: u32) -> anyhow::Result<Arc<BitmapStore>> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(image)
        .with_context(|| format!("cannot create {}", image))?;
    file.set_len(total_blocks as u64 * BLOCK_SZ as u64)?;
    let block_file: Arc<dyn BlockDevice> = Arc::new(BlockFile(Mutex::new(file)));
    let store = BitmapStore::format(block_file, total_blocks)?;
    info!("created {} with {} blocks", image, total_blocks);
    Ok(Arc::new(store))
}

/// Open an image created by `mkfs`
fn open_image(image: &str) -> anyhow::Result<Arc<BitmapStore>> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(image)
        .with_context(|| format!("cannot open {}", image))?;
    let block_file: Arc<dyn BlockDevice> = Arc::new(BlockFile(Mutex::new(file)));
    let store = BitmapStore::open(block_file).with_context(|| format!("{} is not a jumbo-fs image", image))?;
    Ok(Arc::new(store))
}

/// Copy every regular file at the top of `source` into the root directory.
/// Files that do not fit are skipped with a warning.
fn pack(source: &str, image: &str) -> anyhow::Result<()> {
    let store = open_image(image)?;
    let fs = JumboFileSystem::mount(store)?;
    let mut entries: Vec<_> = read_dir(source)
        .with_context(|| format!("cannot read {}", source))?
        .collect::<io::Result<_>>()?;
    entries.sort_by_key(|entry| entry.file_name());
    for entry in entries {
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        //load file data from host file system
        let mut data = Vec::new();
        File::open(entry.path())?.read_to_end(&mut data)?;
        // a file whose content does not fit is not left behind empty
        let packed = fs.creat(&name).and_then(|_| {
            fs.write(&name, &data).or_else(|err| {
                fs.remove(&name)?;
                Err(err)
            })
        });
        match packed {
            Ok(()) => info!("packed {} ({} bytes)", name, data.len()),
            Err(err @ (FsError::Unknown(_) | FsError::DiskFull)) => {
                return Err(err).with_context(|| format!("packing {}", name));
            }
            Err(err) => warn!("skipped {}: {}", name, err),
        }
    }
    fs.unmount()?;
    Ok(())
}

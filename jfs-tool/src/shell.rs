//! A line-oriented shell over a mounted jumbo-fs image
use jumbo_fs::{BitmapStore, BlockKind, FsError, JumboFileSystem, MAX_FILE_SIZE};

use std::io::{BufRead, Write};

/// Run commands read from `input` until `exit` or end of input.
/// File system errors are printed and the shell keeps going.
pub fn run(
    fs: &mut JumboFileSystem,
    store: &BitmapStore,
    input: impl BufRead,
    mut output: impl Write,
) -> anyhow::Result<()> {
    write!(output, "jfs> ")?;
    output.flush()?;
    for line in input.lines() {
        let line = line?;
        let line = line.trim();
        let (cmd, rest) = match line.split_once(' ') {
            Some((cmd, rest)) => (cmd, rest.trim_start()),
            None => (line, ""),
        };
        if cmd == "exit" || cmd == "quit" {
            break;
        }
        if !cmd.is_empty() {
            if let Err(err) = execute(fs, store, cmd, rest, &mut output)? {
                writeln!(output, "{}: {}", cmd, err)?;
            }
        }
        write!(output, "jfs> ")?;
        output.flush()?;
    }
    writeln!(output)?;
    Ok(())
}

/// The outer result carries host I/O failures, the inner one file system errors
fn execute(
    fs: &mut JumboFileSystem,
    store: &BitmapStore,
    cmd: &str,
    arg: &str,
    output: &mut impl Write,
) -> anyhow::Result<Result<(), FsError>> {
    let outcome = match cmd {
        "mkdir" => fs.mkdir(arg),
        "cd" => fs.chdir(if arg.is_empty() { None } else { Some(arg) }),
        "rmdir" => fs.rmdir(arg),
        "touch" => fs.creat(arg),
        "rm" => fs.remove(arg),
        "ls" => match fs.ls() {
            Ok(listing) => {
                for name in &listing.directories {
                    writeln!(output, "{}/", name)?;
                }
                for name in &listing.files {
                    writeln!(output, "{}", name)?;
                }
                Ok(())
            }
            Err(err) => Err(err),
        },
        "stat" => match fs.stat(arg) {
            Ok(stats) => {
                let kind = match stats.kind {
                    BlockKind::Directory => "directory",
                    BlockKind::File => "file",
                };
                writeln!(
                    output,
                    "{}: block {}, {}, {} bytes, {} data blocks",
                    stats.name, stats.block_id, kind, stats.file_size, stats.num_data_blocks
                )?;
                Ok(())
            }
            Err(err) => Err(err),
        },
        "append" => {
            let (name, text) = arg.split_once(' ').unwrap_or((arg, ""));
            fs.write(name, text.as_bytes())
        }
        "cat" => match fs.read(arg, MAX_FILE_SIZE) {
            Ok(data) => {
                output.write_all(&data)?;
                writeln!(output)?;
                Ok(())
            }
            Err(err) => Err(err),
        },
        "df" => {
            writeln!(
                output,
                "{} of {} blocks free",
                store.free_blocks()?,
                store.total_blocks()
            )?;
            Ok(())
        }
        _ => {
            writeln!(output, "unknown command: {}", cmd)?;
            Ok(())
        }
    };
    Ok(outcome)
}

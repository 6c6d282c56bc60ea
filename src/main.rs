//! Command-line entry point: `help`/`query`/`get`/`add`/`mkdir`/`remove` over an
//! ext2 image file (§6).

use extread::device::open_image;
use extread::error::Error;
use extread::error::ForcePolicy;
use extread::error::Forcible;
use extread::image::Image;
use std::env;
use std::fs;
use std::fs::File;
use std::path::Path;
use std::path::PathBuf;
use std::process::exit;

const USAGE: &str = "\
usage: extread <command> [arguments]

commands:
    help                                print this message
    query <image> <absolute-dir-path>   list a directory's entries
    get <image> <absolute-file-path>    write a file's bytes to the current directory
    add <image> <path> <local-file>     (not implemented)
    mkdir <image> <absolute-dir-path>   (not implemented)
    remove <image> <absolute-path>      (not implemented)

environment:
    FORCE=1|true|TRUE   suppress the validation errors marked forcible";

fn main() {
    let mut args = env::args();
    let prog = args.next().unwrap_or_else(|| "extread".to_owned());
    let command = args.next();

    let result = match command.as_deref() {
        None | Some("help") | Some("-h") | Some("--help") => {
            println!("{USAGE}");
            return;
        }
        Some("query") => run_query(args.collect()),
        Some("get") => run_get(args.collect()),
        Some("add") | Some("mkdir") | Some("remove") => {
            Err(Error::ApiMisuse("this subcommand is not implemented".into()))
        }
        Some(other) => Err(Error::InvalidArgument(format!("unknown subcommand `{other}`"))),
    };

    if let Err(e) = result {
        eprintln!("{prog}: {e}");
        if e.forcible() == Forcible::Yes {
            eprintln!("{prog}: hint: set FORCE=true to proceed anyway");
        }
        exit(1);
    }
}

fn run_query(args: Vec<String>) -> Result<(), Error> {
    let [image_path, dir_path] = two_arguments(args)?;

    let mut image = open(&image_path)?;
    let inode = image.resolve(&dir_path)?;
    if !inode.is_directory() {
        return Err(Error::ApiMisuse(format!("{dir_path} is not a directory")));
    }

    let has_dir_type = image.has_dir_type();
    let mut stream = image.blocks(&inode);
    let mut dir = Image::entries(&mut stream, has_dir_type);
    while dir.advance()? {
        let entry = dir.current();
        println!("DirEntry: {}", String::from_utf8_lossy(entry.name()));
    }
    Ok(())
}

fn run_get(args: Vec<String>) -> Result<(), Error> {
    let [image_path, file_path] = two_arguments(args)?;

    let mut image = open(&image_path)?;
    let inode = image.resolve(&file_path)?;
    if !inode.is_file() {
        return Err(Error::ApiMisuse(format!("{file_path} is not a regular file")));
    }

    let basename = Path::new(&file_path)
        .file_name()
        .ok_or_else(|| Error::InvalidArgument(format!("{file_path} has no basename")))?;

    let mut out = Vec::new();
    let mut stream = image.blocks(&inode);
    while stream.advance()? {
        out.extend_from_slice(stream.current());
    }
    fs::write(basename, &out)?;
    Ok(())
}

fn open(path: &str) -> Result<Image<File>, Error> {
    let file = open_image(&PathBuf::from(path))?;
    Image::mount(file, &ForcePolicy::from_env())
}

fn two_arguments(args: Vec<String>) -> Result<[String; 2], Error> {
    let mut it = args.into_iter();
    match (it.next(), it.next(), it.next()) {
        (Some(a), Some(b), None) => Ok([a, b]),
        _ => Err(Error::InvalidArgument("expected exactly 2 arguments".into())),
    }
}

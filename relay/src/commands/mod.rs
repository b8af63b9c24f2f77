pub mod convert;
pub mod serve;
pub mod stream_convert;

use std::{
    fs,
    io::{self, Read, Write},
    path::PathBuf,
};

/// Read all of `path`, or stdin when `path` is `None`.
pub(crate) fn read_input(path: &Option<PathBuf>) -> anyhow::Result<String> {
    match path {
        Some(path) => Ok(fs::read_to_string(path)?),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

/// Write `contents` to `path`, or stdout when `path` is `None`.
pub(crate) fn write_output(path: &Option<PathBuf>, contents: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => fs::write(path, contents)?,
        None => io::stdout().write_all(contents.as_bytes())?,
    }
    Ok(())
}

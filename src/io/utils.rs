//! Utilities for input/output.

use std::{
    fs,
    io::{self, Read},
    path::Path,
};

/// Reads and returns the content of the specified text file.
pub fn read_text_file<P: AsRef<Path>>(file_path: P) -> io::Result<String> {
    let file = fs::File::open(file_path)?;
    let mut text = String::new();
    let _ = io::BufReader::new(file).read_to_string(&mut text)?;
    Ok(text)
}

/// Serializes the given data as JSON and saves it at the given path.
#[cfg(feature = "json")]
pub fn save_data_as_json<T: serde::Serialize, P: AsRef<Path>>(
    file_path: P,
    data: &T,
) -> io::Result<()> {
    let file = io::BufWriter::new(fs::File::create(file_path)?);
    serde_json::to_writer_pretty(file, data)
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))
}

use crate::package::Program;
use std::fs;
use std::io;
use std::path::Path;

pub fn save_program(program: &Program, path: impl AsRef<Path>) -> io::Result<()> {
    let json = serde_json::to_string_pretty(program)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(path, json)?;
    Ok(())
}

pub fn load_program(path: impl AsRef<Path>) -> io::Result<Program> {
    let json = fs::read_to_string(path)?;
    let program =
        serde_json::from_str(&json).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(program)
}

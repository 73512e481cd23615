use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::fs::{self, File};
use std::ffi::OsString;

use anyhow::{Result, Context, anyhow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Dir,
    File,
    Other
}

pub fn easy_filenames_in_dir<P>(
    path: P
) -> Result<impl Iterator<Item = Result<(OsString, FileKind)>>>
where PathBuf: From<P>
{
    let pathbuf: PathBuf = path.into();
    Ok(fs::read_dir(&pathbuf).with_context(
        || anyhow!("can't open directory for reading: {:?}",
                   pathbuf.to_string_lossy()))?
       .map(
           move |entry_result: Result<fs::DirEntry, std::io::Error>|
                                      -> Result<(OsString, FileKind)>
           {
               let entry = entry_result.with_context(
                   || anyhow!("reading directory: {:?}", pathbuf.to_string_lossy()))?;
               // follows symlinks, unlike entry.file_type()
               let ft = fs::metadata(entry.path()).with_context(
                   || anyhow!("stat of {:?}", entry.path()))?.file_type();
               let filename = entry.file_name();
               Ok(
                   (
                       filename,
                       if ft.is_dir() {
                           FileKind::Dir
                       } else if ft.is_file() {
                           FileKind::File
                       } else {
                           FileKind::Other
                       }
                   ))
           }))
}


pub fn easy_filepaths_in_dir<P>(
    path: P
) -> Result<impl Iterator<Item = Result<(PathBuf, FileKind)>>>
where PathBuf: From<P>,
      P: Clone
{
    let pathbuf: PathBuf = path.clone().into();
    Ok(easy_filenames_in_dir(path)?
        .map(move |v| -> Result<(PathBuf, FileKind)> {
            let (item, kind) = v?;
            let mut filepath = pathbuf.clone();
            filepath.push(item);
            Ok((filepath, kind))
        }))
}

/// All files below `dir`, as paths relative to it, sorted. Hidden
/// entries (starting with '.') are skipped.
pub fn files_below(dir: &Path) -> Result<Vec<PathBuf>> {
    fn walk(base: &Path, rel: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
        for entry in easy_filenames_in_dir(base.join(rel))? {
            let (name, kind) = entry?;
            if name.to_string_lossy().starts_with('.') {
                continue
            }
            let relpath = rel.join(&name);
            match kind {
                FileKind::Dir => walk(base, &relpath, out)?,
                FileKind::File => out.push(relpath),
                FileKind::Other => (),
            }
        }
        Ok(())
    }
    let mut out = Vec::new();
    walk(dir, Path::new(""), &mut out)?;
    out.sort();
    Ok(out)
}

pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(
        || anyhow!("reading file {:?}", path.to_string_lossy()))
}

pub fn open_log_output<P>(
    path: P
) -> Result<Box<BufWriter<File>>>
where PathBuf: From<P>
{
    let mut outp = File::options();
    outp.write(true).append(true).create(true);
    let pathb = PathBuf::from(path);
    if let Some(parent) = pathb.parent() {
        fs::create_dir_all(parent).with_context(
            || anyhow!("creating log directory {:?}", parent.to_string_lossy()))?;
    }
    Ok(Box::new(BufWriter::new(outp.open(&pathb).with_context(
        || anyhow!("opening log for output: {:?}", pathb.to_string_lossy()))?)))
}

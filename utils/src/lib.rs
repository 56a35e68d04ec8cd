use std::path::{Path, PathBuf};
use std::fs::File;
use std::io::{Write, Read};
use glob::glob;
use walkdir::WalkDir;

pub use glob::PatternError;

/// zero-padded number used to build record file names (01_02_03 style)
pub fn zero_padded(n:u16,width:usize) -> String {
    format!("{:0width$}",n,width=width)
}

pub fn read_to_string(filepath:&Path) -> std::io::Result<String> {
    let mut f = File::open(filepath)?;
    let mut s = String::new();
    f.read_to_string(&mut s)?;
    Ok(s)
}

pub fn write_to_file(filepath:&Path,contents:&str) -> std::io::Result<()> {
    let mut f = File::create(filepath)?;
    f.write_all(contents.as_bytes())
}

// single depth search
pub fn glob_matches(dir:&Path,pattern:&str) -> Result<Vec<PathBuf>,PatternError> {
    let pat = dir.join(pattern);
    let pat = pat.to_str().unwrap_or(pattern);
    let mut matches:Vec<PathBuf> = glob(pat)?.flat_map(|m| m).collect();
    matches.sort();
    Ok(matches)
}

// recursive walk. Results are sorted so callers see a deterministic order
pub fn find_files(base_dir:&Path,extension:&str) -> Option<Vec<PathBuf>> {
    let mut files = Vec::<PathBuf>::new();
    for entry in WalkDir::new(base_dir).into_iter().filter_map(|e| e.ok()) {
        if let Some(ext) = entry.path().extension() {
            if ext.to_str() == Some(extension) {
                files.push(entry.path().to_owned());
            }
        }
    }
    files.sort();
    match files.len(){
        0 => None,
        _=> Some(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn zero_padding(){
        assert_eq!(zero_padded(3,2),"03");
        assert_eq!(zero_padded(42,2),"42");
        assert_eq!(zero_padded(7,3),"007");
    }

    #[test]
    fn file_discovery_is_sorted(){
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("nested");
        fs::create_dir(&sub).unwrap();
        fs::write(dir.path().join("b.tif"),b"").unwrap();
        fs::write(sub.join("a.tif"),b"").unwrap();
        fs::write(dir.path().join("skip.txt"),b"").unwrap();
        let found = find_files(dir.path(),"tif").unwrap();
        assert_eq!(found.len(),2);
        assert!(found[0] < found[1]);
        assert!(find_files(dir.path(),"zda").is_none());
    }
}

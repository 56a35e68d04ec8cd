//! Region-of-interest exchange files (.dat). ASCII, one integer per line:
//! a region count, then per region its index, its size stored as size+1,
//! the index repeated, and one diode number per line. The size+1 and the
//! repeated index line are quirks the consuming application requires.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use thiserror::Error;
use vi_data::diode;

/// How diode numbers are stored in a region file. The analysis tools this
/// format is exchanged with disagree on the convention, so it stays an
/// explicit choice per file rather than a guess.
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum IndexBase {
    /// stored values are diode numbers
    ZeroBased,
    /// stored values are diode numbers plus one
    OneBased,
}

#[derive(Debug,Error)]
pub enum RoiError {
    #[error("line {line}: cannot parse {what} from {content:?}")]
    Parse{line:usize,what:&'static str,content:String},
    #[error("file ended early at line {line}: expected {what}")]
    UnexpectedEof{line:usize,what:&'static str},
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Clone,Debug,Default,PartialEq,Eq)]
pub struct RegionSet {
    /// ordered regions, each an ordered list of diode numbers
    pub regions:Vec<Vec<u32>>,
}

/// A parsed region set plus the number of unparsed trailing lines. The
/// consuming application tolerates trailing data, so a nonzero count is a
/// warning for the caller to report, not a failure.
#[derive(Clone,Debug,PartialEq,Eq)]
pub struct RoiReadResult {
    pub regions:RegionSet,
    pub unread_lines:usize,
}

impl RegionSet {

    pub fn new(regions:Vec<Vec<u32>>) -> Self {
        Self{regions}
    }

    pub fn n_regions(&self) -> usize {
        self.regions.len()
    }

    /// pixel coordinates of one region, via the frame width
    pub fn points(&self,region_index:usize,width:u32) -> Vec<(u32,u32)> {
        self.regions[region_index].iter().map(|d| diode::to_point(*d,width)).collect()
    }

    pub fn write<W:Write>(&self,writer:&mut W,base:IndexBase) -> Result<(),RoiError> {
        let offset = match base {
            IndexBase::ZeroBased => 0,
            IndexBase::OneBased => 1,
        };
        writeln!(writer,"{}",self.regions.len())?;
        for (i,region) in self.regions.iter().enumerate() {
            writeln!(writer,"{}",i)?;
            // size is stored plus one for the consuming application
            writeln!(writer,"{}",region.len()+1)?;
            writeln!(writer,"{}",i)?;
            for d in region {
                writeln!(writer,"{}",d+offset)?;
            }
        }
        Ok(())
    }

    pub fn to_file(&self,file_path:&Path,base:IndexBase) -> Result<(),RoiError> {
        let mut f = File::create(file_path)?;
        self.write(&mut f,base)
    }

    pub fn read(text:&str,base:IndexBase) -> Result<RoiReadResult,RoiError> {
        let lines:Vec<&str> = text.lines().collect();
        let mut cursor = LineCursor{lines:&lines,next:0};
        let n_regions = cursor.take_usize("region count")?;
        let mut regions = Vec::<Vec<u32>>::with_capacity(n_regions);
        for _ in 0..n_regions {
            cursor.take_usize("region index")?;
            let stored_size = cursor.take_usize("region size")?;
            if stored_size < 1 {
                let line = cursor.next;
                return Err(RoiError::Parse{
                    line,
                    what:"region size",
                    content:stored_size.to_string(),
                });
            }
            let size = stored_size - 1;
            cursor.take_usize("repeated region index")?;
            let mut region = Vec::<u32>::with_capacity(size);
            for _ in 0..size {
                region.push(cursor.take_diode(base)?);
            }
            regions.push(region);
        }
        Ok(RoiReadResult{
            regions:RegionSet{regions},
            unread_lines:lines.len() - cursor.next,
        })
    }

    pub fn from_file(file_path:&Path,base:IndexBase) -> Result<RoiReadResult,RoiError> {
        let mut text = String::new();
        File::open(file_path)?.read_to_string(&mut text)?;
        Self::read(&text,base)
    }
}

struct LineCursor<'a> {
    lines:&'a [&'a str],
    next:usize,
}

impl<'a> LineCursor<'a> {

    fn take(&mut self,what:&'static str) -> Result<&'a str,RoiError> {
        match self.lines.get(self.next) {
            Some(line) => {
                self.next += 1;
                Ok(line.trim())
            }
            None => Err(RoiError::UnexpectedEof{line:self.next+1,what}),
        }
    }

    fn take_usize(&mut self,what:&'static str) -> Result<usize,RoiError> {
        let line = self.take(what)?;
        line.parse().map_err(|_| RoiError::Parse{
            line:self.next,
            what,
            content:line.to_string(),
        })
    }

    fn take_diode(&mut self,base:IndexBase) -> Result<u32,RoiError> {
        let stored = self.take_usize("diode number")? as i64;
        let value = match base {
            IndexBase::ZeroBased => stored,
            IndexBase::OneBased => stored - 1,
        };
        if value < 0 || value > u32::MAX as i64 {
            return Err(RoiError::Parse{
                line:self.next,
                what:"diode number",
                content:stored.to_string(),
            });
        }
        Ok(value as u32)
    }
}

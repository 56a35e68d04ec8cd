//! Drives a whole conversion run: discover capture files, normalize each
//! one, group them into records and write the records out. Every file and
//! every record is processed in isolation, so one bad input is reported
//! and skipped without stopping the batch.

use std::fs;
use std::path::{Path, PathBuf};

use log::{error, info, warn};
use thiserror::Error;
use vi_data::zda::{ImagingRecord, ZdaError, ZdaHeader};

use crate::camera::{self, CameraProgram};
use crate::capture::{NormalizeError, RawCapture};
use crate::grouping::{self, GroupError};
use crate::metadata::{self, RecordContext};
use crate::settings::ConvertSettings;
use crate::tiff_stack::{self, IngestError};

#[derive(Debug,Error)]
pub enum BatchError {
    #[error("unknown camera program {0}")]
    UnknownCameraProgram(u32),
    #[error("no capture files with extension .{extension} under {dir:?}")]
    NoCaptures{dir:PathBuf,extension:String},
    #[error("bad capture file pattern: {0}")]
    Pattern(#[from] utils::PatternError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error(transparent)]
    Group(#[from] GroupError),
    #[error(transparent)]
    Codec(#[from] ZdaError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug,Default)]
pub struct BatchReport {
    pub written:Vec<PathBuf>,
    /// capture files that failed to load or normalize, with the reason
    pub skipped_captures:Vec<(PathBuf,String)>,
    /// record windows that failed to group or write, with the reason
    pub skipped_records:Vec<(Vec<String>,String)>,
    /// trailing captures that did not fill a record
    pub discarded:Vec<String>,
}

pub fn run(settings:&ConvertSettings) -> Result<BatchReport,BatchError> {
    let program = camera::program(settings.camera_program)
        .ok_or(BatchError::UnknownCameraProgram(settings.camera_program))?;
    let files = discover(settings)?;
    info!("{} capture files found under {:?}",files.len(),settings.data_dir);

    let mut report = BatchReport::default();
    let mut captures = Vec::<RawCapture>::new();
    for file in &files {
        match load_and_normalize(file,settings,&program) {
            Ok(capture) => captures.push(capture),
            Err(e) => {
                error!("skipping {:?}: {}",file,e);
                report.skipped_captures.push((file.clone(),e.to_string()));
            }
        }
    }

    // the trailing remainder never fills a record, drop it up front
    let n = settings.trials_per_record;
    let remainder = captures.len() % n;
    if remainder != 0 {
        for capture in captures.split_off(captures.len()-remainder) {
            warn!("discarding {}: does not fill a record of {} trials",capture.source_name,n);
            report.discarded.push(capture.source_name);
        }
    }

    let mut ctx = RecordContext::new(settings.first_record_no,settings.assign_ascending_record_numbers);
    fs::create_dir_all(&settings.output_dir)?;
    let mut remaining = captures;
    while !remaining.is_empty() {
        let rest = remaining.split_off(n.min(remaining.len()));
        let window = remaining;
        remaining = rest;
        let sources:Vec<String> = window.iter().map(|c| c.source_name.clone()).collect();
        match convert_window(window,n,settings,&mut ctx) {
            Ok(path) => {
                info!("written {:?} from {:?}",path,sources);
                report.written.push(path);
            }
            Err(e) => {
                error!("skipping record for {:?}: {}",sources,e);
                report.skipped_records.push((sources,e.to_string()));
            }
        }
    }
    info!("{} records written, {} captures skipped, {} discarded",
          report.written.len(),report.skipped_captures.len(),report.discarded.len());
    Ok(report)
}

fn discover(settings:&ConvertSettings) -> Result<Vec<PathBuf>,BatchError> {
    let files = match &settings.file_glob {
        Some(pattern) => utils::glob_matches(&settings.data_dir,pattern)?,
        None => utils::find_files(&settings.data_dir,&settings.file_extension).unwrap_or_default(),
    };
    if files.is_empty() {
        return Err(BatchError::NoCaptures{
            dir:settings.data_dir.clone(),
            extension:settings.file_extension.clone(),
        });
    }
    Ok(files)
}

fn load_and_normalize(file_path:&Path,settings:&ConvertSettings,program:&CameraProgram)
    -> Result<RawCapture,BatchError> {
    let capture = tiff_stack::read_capture(file_path,program.interval_between_samples,program.program)?;
    let (points,width,height) = (capture.points(),capture.width(),capture.height());
    let x = settings.x_crop.unwrap_or((0,width));
    let y = settings.y_crop.unwrap_or((0,height));
    let t = settings.time_crop.unwrap_or((0,points));
    let factor = settings.binning.unwrap_or(program.recommended_binning() as usize);
    let capture = capture
        .crop(x.0..x.1,y.0..y.1,t.0..t.1)?
        .bin(factor)?
        .flatten_leading_points(settings.flatten_points)?
        .auto_correct_square()?;
    Ok(capture.normalize_bit_range(settings.normalize_bits))
}

fn convert_window(window:Vec<RawCapture>,n:usize,settings:&ConvertSettings,ctx:&mut RecordContext)
    -> Result<PathBuf,BatchError> {
    let mut groups = grouping::group_trials(window,n)?;
    let group = groups.remove(0);
    let record = metadata::fill(group,settings.slice_no,settings.location_no,ctx);
    let out_path = settings.output_dir.join(format!("{}.zda",record_file_stem(&record.header)));
    write_record(&record,&out_path)?;
    Ok(out_path)
}

/// slice_location_record, zero padded the way the analysis tools expect
pub fn record_file_stem(header:&ZdaHeader) -> String {
    format!("{}_{}_{}",
            utils::zero_padded(header.slice_number,2),
            utils::zero_padded(header.location_number,2),
            utils::zero_padded(header.record_number,2))
}

fn write_record(record:&ImagingRecord,out_path:&Path) -> Result<(),BatchError> {
    // write to a sibling temp file first so a failure never replaces an
    // existing record with a partial one
    let tmp = out_path.with_extension("zda.partial");
    match record.to_file(&tmp) {
        Ok(()) => {
            fs::rename(&tmp,out_path)?;
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e.into())
        }
    }
}

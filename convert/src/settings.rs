//! Conversion run settings, kept in a toml file the user edits and hands
//! to the CLI.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::camera::{self, CameraProgram};

pub const DEFAULT_CAMERA_PROGRAM:u32 = 4;

#[derive(Debug,Error)]
pub enum SettingsError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("cannot parse settings: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("cannot serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

pub trait ConfigFile where Self:Sized {
    fn to_file(&self,filename:&Path) -> Result<(),SettingsError>;
    fn from_file(filename:&Path) -> Result<Self,SettingsError>;
}

#[derive(Clone,Debug,PartialEq,Serialize,Deserialize)]
pub struct ConvertSettings {
    /// directory searched recursively for capture stacks
    pub data_dir:PathBuf,
    pub output_dir:PathBuf,
    /// capture file extension to ingest
    pub file_extension:String,
    /// optional glob restricting which capture files are converted,
    /// relative to data_dir. Overrides the extension search
    pub file_glob:Option<String>,
    pub camera_program:u32,
    pub trials_per_record:usize,
    pub slice_no:u16,
    pub location_no:u16,
    pub first_record_no:u16,
    pub assign_ascending_record_numbers:bool,
    /// half-open crops. Unset axes are left whole
    pub time_crop:Option<(usize,usize)>,
    pub x_crop:Option<(usize,usize)>,
    pub y_crop:Option<(usize,usize)>,
    /// block-average factor. Unset means the program's recommended binning
    pub binning:Option<usize>,
    /// leading points flattened to the trace mean
    pub flatten_points:usize,
    /// bit range the samples are rescaled to before writing
    pub normalize_bits:u32,
}

impl ConvertSettings {

    /// A starting point for the given camera program, with its centered
    /// crop window and recommended binning filled in.
    pub fn template_for(program:&CameraProgram) -> Self {
        Self {
            data_dir:PathBuf::from("."),
            output_dir:PathBuf::from("zda_out"),
            file_extension:String::from("tif"),
            file_glob:None,
            camera_program:program.program,
            trials_per_record:5,
            slice_no:1,
            location_no:1,
            first_record_no:1,
            assign_ascending_record_numbers:true,
            time_crop:None,
            x_crop:Some((program.crop_window.0 as usize,program.crop_window.1 as usize)),
            y_crop:None,
            binning:Some(program.recommended_binning() as usize),
            flatten_points:0,
            normalize_bits:12,
        }
    }
}

impl Default for ConvertSettings {
    fn default() -> Self {
        Self::template_for(&camera::PROGRAMS[DEFAULT_CAMERA_PROGRAM as usize])
    }
}

impl ConfigFile for ConvertSettings {

    fn to_file(&self,filename:&Path) -> Result<(),SettingsError> {
        let t = toml::to_string_pretty(&self)?;
        utils::write_to_file(filename,&t)?;
        Ok(())
    }

    fn from_file(filename:&Path) -> Result<Self,SettingsError> {
        let t = utils::read_to_string(filename)?;
        Ok(toml::from_str(&t)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_round_trip_through_toml(){
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("convert_settings.toml");
        let mut settings = ConvertSettings::default();
        settings.file_glob = Some(String::from("trial*.tif"));
        settings.time_crop = Some((0,500));
        settings.to_file(&path).unwrap();
        let read_back = ConvertSettings::from_file(&path).unwrap();
        assert_eq!(read_back,settings);
    }

    #[test]
    fn template_carries_the_program_defaults(){
        let program = camera::program(4).unwrap();
        let settings = ConvertSettings::template_for(&program);
        assert_eq!(settings.camera_program,4);
        assert_eq!(settings.x_crop,Some((176,336)));
        assert_eq!(settings.binning,Some(2));
        assert_eq!(settings.normalize_bits,12);
        assert!(settings.assign_ascending_record_numbers);
    }

    #[test]
    fn corrupt_settings_files_are_reported(){
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path,"data_dir = [not toml").unwrap();
        assert!(matches!(ConvertSettings::from_file(&path),Err(SettingsError::Parse(_))));
    }
}

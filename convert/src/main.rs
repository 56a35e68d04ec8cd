use std::path::PathBuf;

use clap::Parser;

use convert::batch;
use convert::camera;
use convert::settings::{ConfigFile, ConvertSettings, DEFAULT_CAMERA_PROGRAM};
use roi_table::roi_table::{IndexBase, RegionSet};
use vi_data::zda::ZdaHeader;

#[derive(clap::Parser,Debug)]
pub struct ConvertArgs {
    #[command(subcommand)]
    pub action: ConvertAction,
}

#[derive(clap::Subcommand,Debug)]
pub enum ConvertAction {
    /// convert a directory of capture stacks into imaging records
    Run(RunArgs),
    /// create a new settings template to modify for a conversion run
    NewSettingsTemplate(TemplateArgs),
    /// print the header of an imaging record as json
    Header(HeaderArgs),
    /// list the pixel coordinates of each region in a region file
    Regions(RegionsArgs),
}

#[derive(Clone,clap::Args,Debug)]
pub struct RunArgs {
    /// settings file for this conversion run
    settings_file:PathBuf,
}

#[derive(Clone,clap::Args,Debug)]
pub struct TemplateArgs {
    /// where to write the template
    output_settings:PathBuf,
    /// camera program the template is prefilled for
    #[clap(long)]
    camera_program:Option<u32>,
}

#[derive(Clone,clap::Args,Debug)]
pub struct HeaderArgs {
    record_file:PathBuf,
}

#[derive(Clone,clap::Args,Debug)]
pub struct RegionsArgs {
    region_file:PathBuf,
    /// frame width used to translate diode numbers to pixels
    #[clap(long,default_value_t = 80)]
    width:u32,
    /// treat stored diode numbers as one based
    #[clap(long)]
    one_based:bool,
}

fn main() {
    env_logger::init();
    let args = ConvertArgs::parse();
    match args.action {
        ConvertAction::Run(args) => run(args),
        ConvertAction::NewSettingsTemplate(args) => new_settings_template(args),
        ConvertAction::Header(args) => header(args),
        ConvertAction::Regions(args) => regions(args),
    }
}

fn run(args:RunArgs) {
    let settings = match ConvertSettings::from_file(&args.settings_file) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("cannot read settings {:?}: {}",args.settings_file,e);
            std::process::exit(1);
        }
    };
    match batch::run(&settings) {
        Ok(report) => {
            println!("{} records written to {:?}",report.written.len(),settings.output_dir);
            if !report.skipped_captures.is_empty() || !report.skipped_records.is_empty() {
                println!("{} capture files and {} records were skipped, see the log",
                         report.skipped_captures.len(),report.skipped_records.len());
            }
            if !report.discarded.is_empty() {
                println!("{} trailing capture(s) did not fill a record and were discarded",
                         report.discarded.len());
            }
        }
        Err(e) => {
            eprintln!("conversion failed: {}",e);
            std::process::exit(1);
        }
    }
}

fn new_settings_template(args:TemplateArgs) {
    let id = args.camera_program.unwrap_or(DEFAULT_CAMERA_PROGRAM);
    let program = match camera::program(id) {
        Some(program) => program,
        None => {
            eprintln!("unknown camera program {}. Programs run 0 to {}",id,camera::PROGRAMS.len()-1);
            std::process::exit(1);
        }
    };
    let settings = ConvertSettings::template_for(&program);
    match settings.to_file(&args.output_settings) {
        Ok(()) => {
            println!("template for camera program {} ({}) written to {:?}",
                     program.program,program.display(),args.output_settings);
        }
        Err(e) => {
            eprintln!("cannot write template: {}",e);
            std::process::exit(1);
        }
    }
}

fn header(args:HeaderArgs) {
    match ZdaHeader::from_file(&args.record_file) {
        Ok(header) => {
            let json = serde_json::to_string_pretty(&header)
                .expect("header always serializes");
            println!("{}",json);
        }
        Err(e) => {
            eprintln!("cannot read {:?}: {}",args.record_file,e);
            std::process::exit(1);
        }
    }
}

fn regions(args:RegionsArgs) {
    let base = match args.one_based {
        true => IndexBase::OneBased,
        false => IndexBase::ZeroBased,
    };
    let result = match RegionSet::from_file(&args.region_file,base) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("cannot read {:?}: {}",args.region_file,e);
            std::process::exit(1);
        }
    };
    if result.unread_lines > 0 {
        log::warn!("{:?} has {} unparsed trailing line(s)",args.region_file,result.unread_lines);
    }
    let set = result.regions;
    println!("{} region(s)",set.n_regions());
    for i in 0..set.n_regions() {
        let points = set.points(i,args.width);
        println!("region {} ({} px):",i,points.len());
        for (x,y) in points {
            println!("  {} {}",x,y);
        }
    }
}

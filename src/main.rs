//! xrd: command-line front-end for the XRD pattern workbench.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use xrd_workbench::config::Settings;
use xrd_workbench::data::loader;
use xrd_workbench::data::markers::save_markers_csv;
use xrd_workbench::log::reproducibility::ReproLog;
use xrd_workbench::pipeline::background::BackgroundKind;
use xrd_workbench::pipeline::calibration::ReferenceStandard;
use xrd_workbench::pipeline::peaks;
use xrd_workbench::pipeline::processing::ProcessingOp;
use xrd_workbench::project::display;
use xrd_workbench::project::project::Project;
use xrd_workbench::project::specimen::Specimen;
use xrd_workbench::Workbench;

#[derive(Parser)]
#[command(
    name = "xrd",
    version,
    about = "XRD pattern processing: background, smoothing and 2θ calibration"
)]
struct Cli {
    /// Settings file (JSON); built-in defaults when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show a summary of a pattern file
    Info { input: PathBuf },

    /// Convert between text (.dat/.xy) and binary (.raw/.bin) patterns
    Convert { input: PathBuf, output: PathBuf },

    /// Apply background removal, smoothing and shift correction
    Process {
        input: PathBuf,

        /// Output file (defaults to overwriting the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Constant background, or offset added to a pattern background
        #[arg(long)]
        bg_offset: Option<f64>,

        /// Reference pattern used as background
        #[arg(long)]
        bg_pattern: Option<PathBuf>,

        /// Scale applied to the background pattern
        #[arg(long, default_value_t = 1.0)]
        bg_scale: f64,

        /// Estimate a constant background from the minimum intensity
        #[arg(long, default_value_t = false)]
        auto_bg: bool,

        /// Moving-triangle smoothing degree
        #[arg(long)]
        smooth: Option<usize>,

        /// Calibrate 2θ against a reference standard (quartz, silicon, zincite, corundum)
        #[arg(long)]
        calibrate: Option<ReferenceStandard>,

        /// Subtract a fixed 2θ shift
        #[arg(long, conflicts_with = "calibrate")]
        shift: Option<f64>,

        /// Markers (CSV) to carry through the shift; rewritten in place
        #[arg(long)]
        markers: Option<PathBuf>,

        /// Write the processing log as text
        #[arg(long)]
        log: Option<PathBuf>,

        /// Write the processing log as JSON
        #[arg(long)]
        log_json: Option<PathBuf>,

        /// Write a shell script that reproduces this run
        #[arg(long)]
        script: Option<PathBuf>,
    },

    /// Detect peaks and print their positions and d-spacings
    Peaks {
        input: PathBuf,

        /// Fraction of the maximum intensity a peak must exceed
        #[arg(long)]
        threshold: Option<f64>,

        /// Minimum separation between peaks, in °2θ
        #[arg(long)]
        min_separation: Option<f64>,

        /// Print peak counts for this many thresholds instead
        #[arg(long)]
        sweep: Option<usize>,

        /// Save the peaks as markers (CSV)
        #[arg(long)]
        markers: Option<PathBuf>,
    },

    /// Create or inspect project files
    #[command(subcommand)]
    Project(ProjectCommand),
}

#[derive(Subcommand)]
enum ProjectCommand {
    /// Create a project from pattern files
    Create {
        output: PathBuf,

        #[arg(long, default_value = "Project name")]
        name: String,

        #[arg(long, default_value = "")]
        author: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Pattern files, one specimen each; directories add every pattern inside
        patterns: Vec<PathBuf>,
    },

    /// Print a project's settings and specimens
    Show { input: PathBuf },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();

    let settings = Settings::load(cli.config.as_deref())?;
    ::log::debug!("xrd v{} with {:?}", env!("CARGO_PKG_VERSION"), settings);

    match cli.command {
        Command::Info { input } => info(&input),
        Command::Convert { input, output } => convert(&input, &output),
        Command::Process {
            input,
            output,
            bg_offset,
            bg_pattern,
            bg_scale,
            auto_bg,
            smooth,
            calibrate,
            shift,
            markers,
            log,
            log_json,
            script,
        } => {
            let mut wb = Workbench::new(settings);
            let index = wb.load_specimen(&input)?;
            if let Some(path) = &markers {
                wb.import_markers(index, path)?;
            }

            if auto_bg {
                wb.apply(index, ProcessingOp::FindBackground(BackgroundKind::Linear))?;
                wb.apply(index, ProcessingOp::RemoveBackground)?;
            } else if let Some(pattern) = bg_pattern {
                wb.set_background_pattern(index, &pattern, bg_scale, bg_offset.unwrap_or(0.0))?;
                wb.apply(index, ProcessingOp::RemoveBackground)?;
            } else if let Some(offset) = bg_offset {
                wb.set_background_offset(index, offset)?;
                wb.apply(index, ProcessingOp::RemoveBackground)?;
            }

            let degree = smooth.unwrap_or(wb.settings().smoothing_degree);
            if degree > 0 {
                wb.apply(index, ProcessingOp::Smooth { degree })?;
            }

            if let Some(standard) = calibrate {
                wb.apply(index, ProcessingOp::FindShift(standard))?;
                wb.apply(index, ProcessingOp::ApplyShift)?;
            } else if let Some(shift) = shift {
                wb.set_shift(index, shift)?;
                wb.apply(index, ProcessingOp::ApplyShift)?;
            }

            let out = output.unwrap_or_else(|| input.clone());
            wb.project.specimen(index)?.save_data(&out)?;
            println!("{}", wb.status_message());

            if let Some(path) = &markers {
                wb.export_markers(index, path)?;
            }
            if let Some(path) = log {
                wb.export_log_text(&path)?;
            }
            if let Some(path) = log_json {
                wb.export_log_json(&path)?;
            }
            if let Some(path) = script {
                wb.export_log_script(&path)?;
            }
            Ok(())
        }
        Command::Peaks {
            input,
            threshold,
            min_separation,
            sweep,
            markers,
        } => {
            let threshold = threshold.unwrap_or(settings.peak_threshold);
            let min_separation = min_separation.unwrap_or(settings.peak_min_separation);
            let mut log = ReproLog::new();
            let mut specimen = Specimen::from_file(&input, &mut log)?;

            if let Some(steps) = sweep {
                println!("{:>10}  {:>6}", "threshold", "peaks");
                let sweep = peaks::threshold_sweep(&specimen.experimental, steps, min_separation);
                for (t, count) in sweep {
                    println!("{:>10.3}  {:>6}", t, count);
                }
                return Ok(());
            }

            let goniometer = settings.goniometer();
            specimen.detect_peaks(threshold, min_separation, &goniometer, &mut log);
            println!("{:>10}  {:>12}  {:>10}", "2θ (°)", "intensity", "d (nm)");
            for peak in peaks::detect_peaks(&specimen.experimental, threshold, min_separation) {
                let d = goniometer
                    .nm_from_two_theta(peak.position)
                    .map(|d| format!("{:.4}", d))
                    .unwrap_or_else(|| "-".to_string());
                println!("{:>10.3}  {:>12.1}  {:>10}", peak.position, peak.intensity, d);
            }
            if let Some(path) = markers {
                save_markers_csv(&specimen.markers, &path)?;
            }
            Ok(())
        }
        Command::Project(ProjectCommand::Create {
            output,
            name,
            author,
            description,
            patterns,
        }) => {
            let mut log = ReproLog::new();
            let mut project = Project::from_settings(&name, &settings);
            project.set_author(&author);
            project.set_description(&description);
            for path in &patterns {
                let files = if path.is_dir() {
                    loader::list_pattern_files(path)?
                } else {
                    vec![path.clone()]
                };
                for file in files {
                    project.add_specimen(Specimen::from_file(&file, &mut log)?);
                }
            }
            project.save_json(&output)?;
            println!(
                "Created project '{}' with {} specimens",
                project.name(),
                project.specimens().len()
            );
            Ok(())
        }
        Command::Project(ProjectCommand::Show { input }) => show_project(&input),
    }
}

fn info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut log = ReproLog::new();
    let loaded = loader::load_pattern(input, &mut log)?;
    let p = &loaded.pattern;
    println!("File:      {}", input.display());
    println!("Format:    {}", loader::detect_format(input));
    if let Some(header) = &loaded.header {
        println!("Header:    {}", header);
    }
    println!("Points:    {}", p.len());
    if let Some((lo, hi)) = p.x_range() {
        println!("2θ range:  {:.4}° – {:.4}°", lo, hi);
    }
    if let Some(min) = p.min_intensity() {
        println!("Intensity: {:.2} – {:.2}", min, p.max_intensity());
    }
    Ok(())
}

fn convert(input: &Path, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut log = ReproLog::new();
    let loaded = loader::load_pattern(input, &mut log)?;
    let header = loaded
        .header
        .unwrap_or_else(|| loaded.pattern.name.clone());
    loader::save_pattern(output, &header, &loaded.pattern)?;
    println!(
        "{} ({}) -> {} ({})",
        input.display(),
        loader::detect_format(input),
        output.display(),
        loader::detect_format(output)
    );
    Ok(())
}

fn show_project(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let project = Project::load_json(input)?;
    let d = project.display();
    let a = project.axes();
    println!("Project:     {}", project.name());
    println!("Date:        {}", project.date());
    println!("Author:      {}", project.author());
    if !project.description().is_empty() {
        println!("Description: {}", project.description());
    }
    println!(
        "Goniometer:  λ = {} nm, {}° – {}°",
        project.goniometer().wavelength_nm,
        project.goniometer().min_2theta,
        project.goniometer().max_2theta
    );
    println!(
        "Display:     offset {}, group by {}, y-scale {}",
        d.plot_offset,
        d.group_by,
        a.yscale.label()
    );
    println!();
    println!(
        "{:<4} {:<24} {:>8} {:>12} {:>10} {:>8}",
        "#", "Specimen", "Points", "Max", "Scale", "Offset"
    );
    for (i, curves) in display::project_display(&project)?.iter().enumerate() {
        let s = &project.specimens()[i];
        println!(
            "{:<4} {:<24} {:>8} {:>12.1} {:>10.3e} {:>8.3}",
            i,
            s.name,
            s.experimental.len(),
            s.max_intensity(),
            curves.scale,
            curves.offset
        );
    }
    Ok(())
}

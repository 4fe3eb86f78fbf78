use clap::Parser;
use coordenv::chemenv::{CenteringPolicy, StrategySpec};
use coordenv::config::AnalysisConfig;
use coordenv::error::ConfigError;
use coordenv::utils::logger::{self, EventLog};
use coordenv::utils::report;
use coordenv::{run_pipeline, PipelineRequest};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "coordenv")]
#[command(about = "Coordination environments of the sites in a crystal structure")]
#[command(version)]
struct Cli {
    /// POSCAR / CONTCAR file to analyse
    structure_file_path: PathBuf,

    /// Reference point for shape measures
    /// (centroid-including-center, centroid-excluding-center, central-site)
    #[arg(long)]
    centering_policy: Option<CenteringPolicy>,

    /// Drop neighbours farther than this multiple of the shortest distance
    #[arg(long)]
    max_distance_factor: Option<f64>,

    /// Drop neighbours whose solid angle is below this fraction of the largest
    #[arg(long)]
    min_angle_factor: Option<f64>,

    /// Species removed from the analysis (repeatable)
    #[arg(long = "exclude", value_name = "SPECIES")]
    exclude: Vec<String>,

    /// simple:<distance>,<angle> or multiweighted:<preset>
    #[arg(long)]
    strategy: Option<StrategySpec>,

    /// Environment tag for the connectivity graph, e.g. O or T:4 (repeatable)
    #[arg(long = "connectivity-filter", value_name = "TAG")]
    connectivity_filter: Vec<String>,

    /// JSON settings file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Event log, appended to
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Verbose console output
    #[arg(short, long)]
    verbose: bool,
}

fn resolve_config(cli: &Cli) -> Result<AnalysisConfig, ConfigError> {
    let mut cfg = match &cli.config {
        Some(path) => AnalysisConfig::load_from(path)?,
        None => {
            let (cfg, msg) = AnalysisConfig::load_default()?;
            log::debug!("{}", msg);
            cfg
        }
    };

    if let Some(c) = cli.centering_policy {
        cfg.centering = c;
    }
    if let Some(f) = cli.max_distance_factor {
        cfg.voronoi.max_distance_factor = f;
    }
    if let Some(f) = cli.min_angle_factor {
        cfg.voronoi.min_angle_factor = f;
    }
    if !cli.exclude.is_empty() {
        cfg.voronoi.excluded_species = cli.exclude.iter().cloned().collect();
    }
    if let Some(s) = &cli.strategy {
        cfg.strategy = s.clone();
    }
    if !cli.connectivity_filter.is_empty() {
        cfg.connectivity_filter = cli.connectivity_filter.clone();
    }
    if let Some(p) = &cli.log_file {
        cfg.log_file = p.clone();
    }
    Ok(cfg)
}

/// --help and --version are not failures
fn parse_error_code(e: &clap::Error) -> u8 {
    if e.use_stderr() {
        1
    } else {
        0
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(parse_error_code(&e));
        }
    };

    logger::init_console(cli.verbose);

    let cfg = match resolve_config(&cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(1);
        }
    };

    let mut log = match EventLog::open(&cfg.log_file) {
        Ok(log) => log,
        Err(e) => {
            eprintln!("error: cannot open log file {}: {}", cfg.log_file.display(), e);
            return ExitCode::from(1);
        }
    };

    let request = PipelineRequest::from_config(&cli.structure_file_path, &cfg);
    let filename = cli.structure_file_path.display().to_string();

    let code = match run_pipeline(&request, &mut log) {
        Ok(result) => {
            let rendered = if cli.json {
                report::json_report(&result, &filename)
            } else {
                Ok(report::text_report(&result, &filename))
            };
            match rendered {
                Ok(text) => {
                    println!("{}", text);
                    0
                }
                Err(e) => {
                    log.error("main", "report", &e);
                    2
                }
            }
        }
        Err(e) => {
            // Reaches both the console and the log file
            log.error("main", "run_pipeline", &e);
            e.exit_code()
        }
    };

    if let Err(e) = log.finish() {
        eprintln!("warning: could not flush {}: {}", cfg.log_file.display(), e);
    }
    ExitCode::from(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordenv::chemenv::WeightSource;
    use std::collections::BTreeSet;
    use std::io::Write;

    fn settings_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
              "centering": "central-site",
              "voronoi": {{ "max_distance_factor": 1.5, "min_angle_factor": 0.2, "excluded_species": ["O"] }},
              "strategy": {{ "kind": "multi-weighted", "weights": {{ "preset": "stats_article" }} }},
              "connectivity_filter": ["T"],
              "log_file": "from_file.log"
            }}"#
        )
        .unwrap();
        file
    }

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("coordenv").chain(args.iter().copied()))
    }

    #[test]
    fn test_file_values_without_flags() {
        let file = settings_file();
        let path = file.path().to_str().unwrap();
        let cli = parse(&["POSCAR", "--config", path]).unwrap();
        let cfg = resolve_config(&cli).unwrap();

        assert_eq!(cfg.centering, CenteringPolicy::CentralSite);
        assert_eq!(cfg.voronoi.max_distance_factor, 1.5);
        assert_eq!(cfg.voronoi.min_angle_factor, 0.2);
        assert_eq!(cfg.voronoi.excluded_species, BTreeSet::from(["O".to_string()]));
        assert_eq!(
            cfg.strategy,
            StrategySpec::MultiWeighted {
                weights: WeightSource::Preset("stats_article".into())
            }
        );
        assert_eq!(cfg.connectivity_filter, vec!["T".to_string()]);
        assert_eq!(cfg.log_file, PathBuf::from("from_file.log"));
    }

    #[test]
    fn test_flags_override_every_file_value() {
        let file = settings_file();
        let path = file.path().to_str().unwrap();
        let cli = parse(&[
            "POSCAR",
            "--config",
            path,
            "--centering-policy",
            "centroid-excluding-center",
            "--max-distance-factor",
            "1.3",
            "--min-angle-factor",
            "0.1",
            "--exclude",
            "Cl",
            "--exclude",
            "K",
            "--strategy",
            "simple:1.3,0.2",
            "--connectivity-filter",
            "O",
            "--connectivity-filter",
            "T:4",
            "--log-file",
            "from_cli.log",
        ])
        .unwrap();
        let cfg = resolve_config(&cli).unwrap();

        assert_eq!(cfg.centering, CenteringPolicy::CentroidExcludingCenter);
        assert_eq!(cfg.voronoi.max_distance_factor, 1.3);
        assert_eq!(cfg.voronoi.min_angle_factor, 0.1);
        // Repeated --exclude replaces the file's list
        assert_eq!(
            cfg.voronoi.excluded_species,
            BTreeSet::from(["Cl".to_string(), "K".to_string()])
        );
        assert_eq!(
            cfg.strategy,
            StrategySpec::Simple {
                distance_cutoff: 1.3,
                angle_cutoff: 0.2
            }
        );
        assert_eq!(cfg.connectivity_filter, vec!["O".to_string(), "T:4".to_string()]);
        assert_eq!(cfg.log_file, PathBuf::from("from_cli.log"));
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let cli = parse(&["POSCAR", "--config", "/no/such/settings.json"]).unwrap();
        assert!(matches!(resolve_config(&cli), Err(ConfigError::File { .. })));
    }

    #[test]
    fn test_bad_values_exit_one() {
        for args in [
            &["POSCAR", "--strategy", "bogus"][..],
            &["POSCAR", "--centering-policy", "middle"][..],
            &["POSCAR", "--max-distance-factor", "abc"][..],
            &[][..],
        ] {
            let err = parse(args).err().unwrap();
            assert!(err.use_stderr(), "{:?}", args);
            assert_eq!(parse_error_code(&err), 1, "{:?}", args);
        }
    }

    #[test]
    fn test_help_and_version_exit_zero() {
        for flag in ["--help", "--version"] {
            let err = parse(&[flag]).err().unwrap();
            assert!(!err.use_stderr());
            assert_eq!(parse_error_code(&err), 0);
        }
    }
}

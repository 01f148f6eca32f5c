//! Delegation to the external LKH solver over its file-based protocol.
//!
//! The matrix is emitted as a TSPLIB problem with explicit integer weights,
//! the solver runs as a child process under a hard wall-clock deadline, and
//! its tour file is parsed back. Every failure along the way is recoverable:
//! the caller degrades to the built-in heuristic.

use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use itertools::Itertools;
use log::debug;
use tempfile::{Builder, NamedTempFile};
use thiserror::Error;

use crate::matrix::DistanceMatrix;
use crate::tour::{tour_distance, Tour};

/// Weight written for edges the solver must never pick: unreachable pairs
/// and off-diagonal weights that would otherwise round to zero.
const UNREACHABLE_WEIGHT: i64 = 999_999;
/// Edge weights are scaled to integers keeping three decimals of precision.
const WEIGHT_SCALE: f32 = 1000.0;
/// Wall-clock slack granted beyond the solver's own time limit before the
/// child is killed.
const DEADLINE_GRACE: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Settings for the external solver run.
#[derive(Clone, Debug)]
pub struct LkhConfig {
    /// Turns the delegation off entirely, forcing the built-in fallback.
    pub enabled: bool,
    /// Name or path of the solver executable.
    pub executable: String,
    pub runs: u32,
    /// Time limit handed to the solver, in seconds.
    pub time_limit: u64,
    pub trace_level: u32,
}

impl Default for LkhConfig {
    fn default() -> LkhConfig {
        LkhConfig {
            enabled: true,
            executable: "LKH".to_string(),
            runs: 1,
            time_limit: 30,
            trace_level: 0,
        }
    }
}

impl LkhConfig {
    /// Configuration that never launches the external solver.
    pub fn disabled() -> LkhConfig {
        LkhConfig {
            enabled: false,
            ..LkhConfig::default()
        }
    }
}

/// Failures of the external solver step.
#[derive(Debug, Error)]
pub(crate) enum LkhError {
    #[error("problem too small for the external solver ({0} nodes)")]
    TooSmall(usize),
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("could not launch {0}: {1}")]
    Launch(String, io::Error),
    #[error("solver timed out after {0}s")]
    Timeout(u64),
    #[error("solver exited with {0}")]
    Failed(ExitStatus),
    #[error("solver tour names {got} of {want} nodes")]
    IncompleteTour { got: usize, want: usize },
}

pub(crate) fn solve(matrix: &DistanceMatrix, config: &LkhConfig) -> Result<Tour, LkhError> {
    let n = matrix.size();
    if n < 3 {
        return Err(LkhError::TooSmall(n));
    }

    // Uniquely named per invocation; the guards remove all three files on
    // every exit path.
    let mut problem = temp_file(".tsp")?;
    let output = temp_file(".tour")?;
    let mut params = temp_file(".par")?;

    write_problem(problem.as_file_mut(), matrix)?;
    write_params(params.as_file_mut(), problem.path(), output.path(), config)?;

    debug!(
        "running {} on {} ({} nodes)",
        config.executable,
        params.path().display(),
        n
    );
    run_solver(params.path(), config)?;

    let text = std::fs::read_to_string(output.path())?;
    parse_tour(&text, matrix)
}

fn temp_file(suffix: &str) -> io::Result<NamedTempFile> {
    Builder::new().prefix("grid_tour_").suffix(suffix).tempfile()
}

fn scaled_weight(weight: f32, diagonal: bool) -> i64 {
    if diagonal {
        return 0;
    }
    if !weight.is_finite() {
        return UNREACHABLE_WEIGHT;
    }
    let scaled = (weight * WEIGHT_SCALE) as i64;
    if scaled == 0 {
        UNREACHABLE_WEIGHT
    } else {
        scaled
    }
}

fn write_problem<W: Write>(writer: W, matrix: &DistanceMatrix) -> io::Result<()> {
    let n = matrix.size();
    let mut writer = BufWriter::new(writer);
    writeln!(writer, "NAME: grid_tour")?;
    writeln!(writer, "TYPE: TSP")?;
    writeln!(writer, "DIMENSION: {}", n)?;
    writeln!(writer, "EDGE_WEIGHT_TYPE: EXPLICIT")?;
    writeln!(writer, "EDGE_WEIGHT_FORMAT: FULL_MATRIX")?;
    writeln!(writer, "EDGE_WEIGHT_SECTION")?;
    for from in 0..n {
        let row = (0..n)
            .map(|to| scaled_weight(matrix.get(from, to), from == to).to_string())
            .join(" ");
        writeln!(writer, "{}", row)?;
    }
    writeln!(writer, "EOF")?;
    writer.flush()
}

fn write_params<W: Write>(
    writer: W,
    problem: &Path,
    output: &Path,
    config: &LkhConfig,
) -> io::Result<()> {
    let mut writer = BufWriter::new(writer);
    writeln!(writer, "PROBLEM_FILE = {}", problem.display())?;
    writeln!(writer, "TOUR_FILE = {}", output.display())?;
    writeln!(writer, "RUNS = {}", config.runs)?;
    writeln!(writer, "TIME_LIMIT = {}", config.time_limit)?;
    writeln!(writer, "TRACE_LEVEL = {}", config.trace_level)?;
    writer.flush()
}

/// Runs the solver under a hard wall-clock deadline, killing it on overrun.
fn run_solver(params: &Path, config: &LkhConfig) -> Result<(), LkhError> {
    let mut child = Command::new(&config.executable)
        .arg(params)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|err| LkhError::Launch(config.executable.clone(), err))?;

    let deadline = Instant::now() + Duration::from_secs(config.time_limit) + DEADLINE_GRACE;
    loop {
        match child.try_wait()? {
            Some(status) if status.success() => return Ok(()),
            Some(status) => return Err(LkhError::Failed(status)),
            None if Instant::now() >= deadline => {
                child.kill().ok();
                child.wait()?;
                return Err(LkhError::Timeout(config.time_limit));
            }
            None => std::thread::sleep(POLL_INTERVAL),
        }
    }
}

/// Parses the solver's tour file: 1-based city ids after `TOUR_SECTION`
/// until the `-1` terminator, plus the scaled total length from a
/// `Length =` comment. A missing length comment is repaired by recomputing
/// the length from the matrix.
fn parse_tour(text: &str, matrix: &DistanceMatrix) -> Result<Tour, LkhError> {
    let n = matrix.size();
    let mut order: Vec<usize> = Vec::with_capacity(n + 1);
    let mut reported_length: Option<f32> = None;
    let mut in_tour_section = false;
    for line in text.lines() {
        let line = line.trim();
        if line == "TOUR_SECTION" {
            in_tour_section = true;
            continue;
        }
        if line.starts_with("COMMENT") {
            if let Some(value) = line.split("Length =").nth(1) {
                reported_length = value
                    .split_whitespace()
                    .next()
                    .and_then(|v| v.parse::<f32>().ok())
                    .map(|v| v / WEIGHT_SCALE);
            }
            continue;
        }
        if in_tour_section {
            let Ok(city) = line.parse::<i64>() else { continue };
            if city == -1 {
                break;
            }
            if city > 0 && order.len() < n {
                order.push(city as usize - 1);
            }
        }
    }
    if order.len() != n {
        return Err(LkhError::IncompleteTour {
            got: order.len(),
            want: n,
        });
    }
    order.push(order[0]);
    let total_distance = reported_length.unwrap_or_else(|| tour_distance(matrix, &order));
    Ok(Tour {
        order,
        total_distance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_matrix() -> DistanceMatrix {
        let mut matrix = DistanceMatrix::new(4);
        let costs = [
            [0.0, 1.0, 2.0, 1.0],
            [1.0, 0.0, 1.0, 2.0],
            [2.0, 1.0, 0.0, 1.0],
            [1.0, 2.0, 1.0, 0.0],
        ];
        for (i, row) in costs.iter().enumerate() {
            for (j, &cost) in row.iter().enumerate() {
                matrix.set(i, j, cost);
            }
        }
        matrix
    }

    #[test]
    fn weights_are_scaled_with_sentinels() {
        assert_eq!(scaled_weight(0.0, true), 0);
        assert_eq!(scaled_weight(1.5, false), 1500);
        assert_eq!(scaled_weight(0.0, false), UNREACHABLE_WEIGHT);
        assert_eq!(scaled_weight(0.0004, false), UNREACHABLE_WEIGHT);
        assert_eq!(scaled_weight(f32::INFINITY, false), UNREACHABLE_WEIGHT);
    }

    #[test]
    fn problem_file_is_tsplib() {
        let mut matrix = DistanceMatrix::new(3);
        matrix.set(0, 0, 0.0);
        matrix.set(1, 1, 0.0);
        matrix.set(2, 2, 0.0);
        matrix.set(0, 1, 2.0);
        matrix.set(1, 0, 2.0);
        matrix.set(0, 2, 3.5);
        matrix.set(2, 0, 3.5);
        // (1, 2) left unreachable.

        let mut buffer = Vec::new();
        write_problem(&mut buffer, &matrix).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let expected = "NAME: grid_tour\n\
                        TYPE: TSP\n\
                        DIMENSION: 3\n\
                        EDGE_WEIGHT_TYPE: EXPLICIT\n\
                        EDGE_WEIGHT_FORMAT: FULL_MATRIX\n\
                        EDGE_WEIGHT_SECTION\n\
                        0 2000 3500\n\
                        2000 0 999999\n\
                        3500 999999 0\n\
                        EOF\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn parameter_file_lists_the_protocol_fields() {
        let mut buffer = Vec::new();
        let config = LkhConfig {
            time_limit: 10,
            trace_level: 1,
            ..LkhConfig::default()
        };
        write_params(
            &mut buffer,
            Path::new("/tmp/p.tsp"),
            Path::new("/tmp/p.tour"),
            &config,
        )
        .unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(
            text,
            "PROBLEM_FILE = /tmp/p.tsp\n\
             TOUR_FILE = /tmp/p.tour\n\
             RUNS = 1\n\
             TIME_LIMIT = 10\n\
             TRACE_LEVEL = 1\n"
        );
    }

    #[test]
    fn tour_output_is_parsed_and_rescaled() {
        let matrix = square_matrix();
        let text = "NAME : grid_tour.tour\n\
                    COMMENT : Length = 4000\n\
                    TYPE : TOUR\n\
                    DIMENSION : 4\n\
                    TOUR_SECTION\n\
                    1\n2\n3\n4\n-1\nEOF\n";
        let tour = parse_tour(text, &matrix).unwrap();
        assert_eq!(tour.order, vec![0, 1, 2, 3, 0]);
        assert_eq!(tour.total_distance, 4.0);
    }

    #[test]
    fn missing_length_comment_is_recomputed() {
        let matrix = square_matrix();
        let text = "TOUR_SECTION\n1\n2\n3\n4\n-1\n";
        let tour = parse_tour(text, &matrix).unwrap();
        assert_eq!(tour.order, vec![0, 1, 2, 3, 0]);
        assert_eq!(tour.total_distance, 4.0);
    }

    #[test]
    fn incomplete_tours_are_rejected() {
        let matrix = square_matrix();
        let text = "TOUR_SECTION\n1\n2\n-1\n";
        match parse_tour(text, &matrix) {
            Err(LkhError::IncompleteTour { got: 2, want: 4 }) => {}
            other => panic!("expected an incomplete tour, got {:?}", other),
        }
    }

    #[test]
    fn missing_executable_reports_launch_failure() {
        let matrix = square_matrix();
        let config = LkhConfig {
            executable: "grid-tour-no-such-solver".to_string(),
            ..LkhConfig::default()
        };
        match solve(&matrix, &config) {
            Err(LkhError::Launch(name, _)) => assert_eq!(name, "grid-tour-no-such-solver"),
            other => panic!("expected a launch failure, got {:?}", other),
        }
    }

    #[test]
    fn tiny_problems_skip_the_delegate() {
        let matrix = DistanceMatrix::new(2);
        match solve(&matrix, &LkhConfig::default()) {
            Err(LkhError::TooSmall(2)) => {}
            other => panic!("expected a too-small error, got {:?}", other),
        }
    }
}

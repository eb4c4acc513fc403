//! Solver configuration: defaults, a TOML config file, and dotted
//! `KEY=VALUE` inline options (the latter win, in the order given).

use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use crate::finder::FinderConfig;
use crate::hill_climbing::HillClimbingParams;
use crate::local_search::LocalSearchParams;
use crate::simulated_annealing::SimulatedAnnealingParams;
use crate::solver::MethodKind;
use crate::tabu_search::TabuSearchParams;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub solver: SolverSection,
    pub finder: FinderConfig,
    pub ls: LocalSearchParams,
    pub hc: HillClimbingParams,
    pub ts: TabuSearchParams,
    pub sa: SimulatedAnnealingParams,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverSection {
    pub methods: Vec<MethodKind>,
    /// Seconds; non-positive means unlimited.
    pub max_time: i64,
    /// Cycles; negative means unlimited.
    pub max_cycles: i64,
    pub multistart: bool,
    /// Non-positive disables restoring.
    pub restore_best_after_cycles: i64,
}

impl Default for SolverSection {
    fn default() -> Self {
        SolverSection {
            methods: vec![MethodKind::Hc, MethodKind::Sa],
            max_time: 60,
            max_cycles: -1,
            multistart: false,
            restore_best_after_cycles: 15,
        }
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    let matches_any = |candidates: &[&str]| {
        candidates
            .iter()
            .any(|expected| value.eq_ignore_ascii_case(expected))
    };
    if matches_any(&["y", "yes", "true", "1"]) {
        return Ok(true);
    }
    if matches_any(&["n", "no", "false", "0"]) {
        return Ok(false);
    }
    bail!("could not parse {value:?} as a boolean")
}

fn parse_num<T: FromStr>(value: &str, what: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("could not parse {value:?} as {what}"))
}

impl Config {
    pub fn read_from_toml(path: &Path) -> Result<Self> {
        let toml_string = fs::read_to_string(path)
            .with_context(|| anyhow!("failed to read config at {}", path.display()))?;
        toml::from_str(&toml_string)
            .with_context(|| anyhow!("failed to parse config at {}", path.display()))
    }

    /// Applies one dotted `KEY=VALUE` option on top of the current values.
    pub fn apply_option(&mut self, option: &str) -> Result<()> {
        let (key, value) = option
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got {option:?}"))?;
        let (key, value) = (key.trim(), value.trim());

        match key {
            "solver.methods" => {
                self.solver.methods = value
                    .split(',')
                    .map(|method| {
                        MethodKind::from_str(method.trim()).map_err(|_| {
                            anyhow!(
                                "unknown method {:?} (possible values: ls, hc, ts, sa)",
                                method.trim()
                            )
                        })
                    })
                    .collect::<Result<_>>()?;
            }
            "solver.max_time" => self.solver.max_time = parse_num(value, "an integer")?,
            "solver.max_cycles" => self.solver.max_cycles = parse_num(value, "an integer")?,
            "solver.multistart" => self.solver.multistart = parse_bool(value)?,
            "solver.restore_best_after_cycles" => {
                self.solver.restore_best_after_cycles = parse_num(value, "an integer")?
            }
            "finder.ranking_randomness" => {
                self.finder.ranking_randomness = parse_num(value, "a number")?
            }
            "ls.steepest" => self.ls.steepest = parse_bool(value)?,
            "hc.max_idle" => self.hc.max_idle = parse_num(value, "an integer")?,
            "ts.max_idle" => self.ts.max_idle = parse_num(value, "an integer")?,
            "ts.tabu_tenure" => self.ts.tabu_tenure = parse_num(value, "an integer")?,
            "ts.frequency_penalty_coeff" => {
                self.ts.frequency_penalty_coeff = parse_num(value, "a number")?
            }
            "ts.random_pick" => self.ts.random_pick = parse_bool(value)?,
            "ts.steepest" => self.ts.steepest = parse_bool(value)?,
            "ts.clear_on_best" => self.ts.clear_on_best = parse_bool(value)?,
            "sa.max_idle" => self.sa.max_idle = parse_num(value, "an integer")?,
            "sa.initial_temperature" => {
                self.sa.initial_temperature = parse_num(value, "a number")?
            }
            "sa.cooling_rate" => self.sa.cooling_rate = parse_num(value, "a number")?,
            "sa.min_temperature" => self.sa.min_temperature = parse_num(value, "a number")?,
            "sa.temperature_length_coeff" => {
                self.sa.temperature_length_coeff = parse_num(value, "a number")?
            }
            _ => bail!("unknown option key {key:?}"),
        }
        Ok(())
    }

    /// Range checks, run once before solving starts.
    pub fn validate(&self) -> Result<()> {
        if self.solver.methods.is_empty() {
            bail!("solver.methods must name at least one method");
        }
        if self.finder.ranking_randomness < 0.0 {
            bail!("finder.ranking_randomness must be non-negative");
        }
        if self.hc.max_idle == 0 {
            bail!("hc.max_idle must be positive");
        }
        if self.ts.max_idle == 0 {
            bail!("ts.max_idle must be positive");
        }
        if self.ts.frequency_penalty_coeff <= 0.0 {
            bail!("ts.frequency_penalty_coeff must be positive");
        }
        if self.sa.max_idle == 0 {
            bail!("sa.max_idle must be positive");
        }
        if self.sa.initial_temperature <= 0.0 {
            bail!("sa.initial_temperature must be positive");
        }
        if self.sa.min_temperature <= 0.0 {
            bail!("sa.min_temperature must be positive");
        }
        if !(0.0 < self.sa.cooling_rate && self.sa.cooling_rate < 1.0) {
            bail!("sa.cooling_rate must be in (0, 1)");
        }
        if self.sa.temperature_length_coeff <= 0.0 {
            bail!("sa.temperature_length_coeff must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.solver.methods, vec![MethodKind::Hc, MethodKind::Sa]);
        assert_eq!(config.solver.max_time, 60);
        assert_eq!(config.finder.ranking_randomness, 0.33);
        assert_eq!(config.hc.max_idle, 120_000);
        assert_eq!(config.ts.tabu_tenure, 120);
        assert_eq!(config.sa.cooling_rate, 0.96);
    }

    #[test]
    fn toml_overrides_defaults() {
        let config: Config = toml::from_str(
            "[solver]\n\
             methods = [\"ls\", \"ts\"]\n\
             max_time = 10\n\
             [ts]\n\
             tabu_tenure = 60\n",
        )
        .unwrap();
        assert_eq!(config.solver.methods, vec![MethodKind::Ls, MethodKind::Ts]);
        assert_eq!(config.solver.max_time, 10);
        assert_eq!(config.ts.tabu_tenure, 60);
        assert!(config.ts.random_pick, "untouched fields keep defaults");
    }

    #[test]
    fn inline_options_parse_every_key_kind() {
        let mut config = Config::default();
        config.apply_option("solver.methods=ls, hc").unwrap();
        config.apply_option("solver.multistart=yes").unwrap();
        config.apply_option("solver.max_cycles=5").unwrap();
        config.apply_option("finder.ranking_randomness=0.5").unwrap();
        config.apply_option("sa.cooling_rate=0.9").unwrap();
        config.apply_option("ts.steepest=false").unwrap();

        assert_eq!(config.solver.methods, vec![MethodKind::Ls, MethodKind::Hc]);
        assert!(config.solver.multistart);
        assert_eq!(config.solver.max_cycles, 5);
        assert_eq!(config.finder.ranking_randomness, 0.5);
        assert_eq!(config.sa.cooling_rate, 0.9);
        assert!(!config.ts.steepest);
        config.validate().unwrap();
    }

    #[test]
    fn bad_options_are_rejected() {
        let mut config = Config::default();
        assert!(config.apply_option("solver.methods=ls,xx").is_err());
        assert!(config.apply_option("solver.max_time").is_err());
        assert!(config.apply_option("nope.key=1").is_err());
        assert!(config.apply_option("hc.max_idle=abc").is_err());
    }

    #[test]
    fn out_of_range_values_fail_validation() {
        let mut config = Config::default();
        config.apply_option("sa.cooling_rate=1.5").unwrap();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.apply_option("solver.methods=hc").unwrap();
        config.solver.methods.clear();
        assert!(config.validate().is_err());
    }
}

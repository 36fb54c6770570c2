use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::constants::{
    DEFAULT_CLOCK_MHZ, DEFAULT_QUEUE_CAPACITY, DEFAULT_STALL_TIMEOUT_MS, DEFAULT_WINDOW_TICKS,
};
use super::error::ConfigError;

/// Structure representing the application configuration. Contains pathing, run and matching information
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub head_path: PathBuf,
    pub tail_path: PathBuf,
    pub output_path: PathBuf,
    /// Coincidence window in timestamp clock ticks
    pub window_ticks: u64,
    /// Maximum number of unmatched events held per subsystem
    pub queue_capacity: usize,
    /// Timestamp clock frequency in MHz
    pub clock_mhz: f64,
    /// How long a producer waits on a full queue before giving up with an overflow
    pub stall_timeout_ms: u64,
    pub first_run_number: i32,
    pub last_run_number: i32,
    pub n_threads: i32,
}

impl Default for Config {
    /// Generate a new Config object. Paths will be empty/invalid
    fn default() -> Self {
        Self {
            head_path: PathBuf::from("None"),
            tail_path: PathBuf::from("None"),
            output_path: PathBuf::from("None"),
            window_ticks: DEFAULT_WINDOW_TICKS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            clock_mhz: DEFAULT_CLOCK_MHZ,
            stall_timeout_ms: DEFAULT_STALL_TIMEOUT_MS,
            first_run_number: 0,
            last_run_number: 0,
            n_threads: 1,
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Check the matching parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::BadCapacity(self.queue_capacity));
        }
        if self.clock_mhz.is_nan() || self.clock_mhz <= 0.0 {
            return Err(ConfigError::BadClock(self.clock_mhz));
        }
        if !self.is_n_threads_valid() {
            return Err(ConfigError::BadThreads(self.n_threads));
        }
        Ok(())
    }

    /// Check if a specific run exists; both subsystems need data
    pub fn does_run_exist(&self, run_number: i32) -> bool {
        self.head_path.join(self.get_run_str(run_number)).exists()
            && self.tail_path.join(self.get_run_str(run_number)).exists()
    }

    /// Get the directory holding the head stream segments of a run
    pub fn get_head_directory(&self, run_number: i32) -> Result<PathBuf, ConfigError> {
        Self::existing(self.head_path.join(self.get_run_str(run_number)))
    }

    /// Get the directory holding the tail stream segments of a run
    pub fn get_tail_directory(&self, run_number: i32) -> Result<PathBuf, ConfigError> {
        Self::existing(self.tail_path.join(self.get_run_str(run_number)))
    }

    /// Get the path to the output coincidence listing
    pub fn get_listing_file_name(&self, run_number: i32) -> Result<PathBuf, ConfigError> {
        Self::existing(self.output_path.clone())
            .map(|dir| dir.join(format!("{}.coinc", self.get_run_str(run_number))))
    }

    /// Get the path to the output diagnostics report
    pub fn get_report_file_name(&self, run_number: i32) -> Result<PathBuf, ConfigError> {
        Self::existing(self.output_path.clone())
            .map(|dir| dir.join(format!("{}.yaml", self.get_run_str(run_number))))
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_millis(self.stall_timeout_ms)
    }

    pub fn is_n_threads_valid(&self) -> bool {
        self.n_threads >= 1
    }

    /// Construct the run string
    fn get_run_str(&self, run_number: i32) -> String {
        format!("run_{run_number:0>4}")
    }

    fn existing(path: PathBuf) -> Result<PathBuf, ConfigError> {
        if path.exists() {
            Ok(path)
        } else {
            Err(ConfigError::BadFilePath(path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.yaml");
        assert!(matches!(
            Config::read_config_file(&path),
            Err(ConfigError::BadFilePath(_))
        ));
    }

    #[test]
    fn reads_yaml_and_resolves_run_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("head/run_0007")).unwrap();
        std::fs::create_dir_all(dir.path().join("tail/run_0007")).unwrap();
        std::fs::create_dir_all(dir.path().join("out")).unwrap();
        let yaml = format!(
            "head_path: {0}/head\ntail_path: {0}/tail\noutput_path: {0}/out\nwindow_ticks: 5\n\
             queue_capacity: 2\nclock_mhz: 20.0\nstall_timeout_ms: 10\nfirst_run_number: 7\n\
             last_run_number: 8\nn_threads: 1\n",
            dir.path().display()
        );
        let config_path = dir.path().join("config.yaml");
        std::fs::write(&config_path, yaml).unwrap();

        let config = Config::read_config_file(&config_path).unwrap();
        assert_eq!(config.window_ticks, 5);
        assert!(config.validate().is_ok());
        assert!(config.does_run_exist(7));
        assert!(!config.does_run_exist(8));
        assert_eq!(
            config.get_head_directory(7).unwrap(),
            dir.path().join("head/run_0007")
        );
        assert!(config.get_tail_directory(8).is_err());
        assert_eq!(
            config.get_listing_file_name(7).unwrap(),
            dir.path().join("out/run_0007.coinc")
        );
        assert_eq!(config.stall_timeout(), Duration::from_millis(10));
    }

    #[test]
    fn validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());
        config.queue_capacity = 0;
        assert!(matches!(config.validate(), Err(ConfigError::BadCapacity(0))));
        config.queue_capacity = 1;
        config.clock_mhz = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::BadClock(_))));
        config.clock_mhz = 20.0;
        config.n_threads = 0;
        assert!(matches!(config.validate(), Err(ConfigError::BadThreads(0))));
    }
}

use crate::analysis::Analyzer;
use crate::config::Config;
use crate::engine::Swarm;
use crate::state::Snapshot;
use anyhow::{Context, Result, bail};
use glob::glob;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Run directory layout:
///
/// - `config.toml`: controller configuration
/// - `snapshot-NNNN.toml`: state feed of cycle `NNNN`
/// - `commands-NNNN.msgpack`: commands emitted for cycle `NNNN`
/// - `checkpoint.msgpack`: swarm state after the last processed cycle
/// - `results.json`: analysis output
pub struct Manager {
    run_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(run_dir: P) -> Result<Self> {
        let run_dir = run_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(run_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { run_dir, cfg })
    }

    pub fn init_swarm(&self, seed: Option<u64>) -> Result<()> {
        let checkpoint_file = self.checkpoint_file();
        if checkpoint_file.exists() {
            bail!("{checkpoint_file:?} already exists");
        }

        let swarm = match seed {
            Some(seed) => Swarm::with_seed(self.cfg.clone(), seed),
            None => Swarm::new(self.cfg.clone()).context("failed to seed swarm")?,
        };

        swarm
            .save_checkpoint(&checkpoint_file)
            .context("failed to save checkpoint")?;
        log::info!("created {checkpoint_file:?}");

        Ok(())
    }

    pub fn run_swarm(&self) -> Result<()> {
        let checkpoint_file = self.checkpoint_file();
        let mut swarm = Swarm::load_checkpoint(&checkpoint_file)
            .with_context(|| format!("failed to load {checkpoint_file:?}"))?;
        if swarm.cfg() != &self.cfg {
            bail!("checkpoint config differs from the current config");
        }
        log::info!("loaded {checkpoint_file:?}");

        let first_cycle = swarm.cycle();
        loop {
            let cycle = swarm.cycle();
            let snapshot_file = self.snapshot_file(cycle);
            if !snapshot_file.exists() {
                break;
            }

            let snapshot = Snapshot::from_file(&snapshot_file)
                .with_context(|| format!("failed to load {snapshot_file:?}"))?;
            let record = swarm
                .step(&snapshot.agents)
                .with_context(|| format!("failed to run cycle {cycle}"))?;
            record
                .save(self.commands_file(cycle))
                .context("failed to save commands")?;
        }
        log::info!("processed cycles {first_cycle}..{}", swarm.cycle());

        swarm
            .save_checkpoint(&checkpoint_file)
            .context("failed to save checkpoint")?;

        Ok(())
    }

    pub fn analyze_run(&self) -> Result<()> {
        let mut analyzer = Analyzer::new(&self.cfg);

        let commands_files = self.commands_files().context("failed to list commands files")?;
        for file in &commands_files {
            analyzer
                .add_file(file)
                .with_context(|| format!("failed to add {file:?}"))?;
        }
        log::info!("analyzed {} commands files", commands_files.len());

        let results_file = self.results_file();
        analyzer
            .save_results(&results_file)
            .context("failed to save results")?;
        log::info!("wrote {results_file:?}");

        Ok(())
    }

    pub fn clean_run(&self) -> Result<()> {
        let commands_files = self.commands_files().context("failed to list commands files")?;
        for file in commands_files {
            fs::remove_file(&file).with_context(|| format!("failed to remove {file:?}"))?;
        }

        for file in [self.checkpoint_file(), self.results_file()] {
            if file.exists() {
                fs::remove_file(&file).with_context(|| format!("failed to remove {file:?}"))?;
            }
        }
        log::info!("cleaned {:?}", self.run_dir);

        Ok(())
    }

    /// Every `commands-*.msgpack` file, ordered by cycle index.
    fn commands_files(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.run_dir.join("commands-*.msgpack");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let mut files: Vec<(usize, PathBuf)> = glob(pattern)
            .context("failed to glob commands files")?
            .filter_map(Result::ok)
            .filter_map(|file| {
                let stem = file.file_stem()?.to_str()?;
                let cycle = stem.strip_prefix("commands-")?.parse().ok()?;
                Some((cycle, file))
            })
            .collect();
        files.sort_by_key(|&(cycle, _)| cycle);
        Ok(files.into_iter().map(|(_, file)| file).collect())
    }

    fn snapshot_file(&self, cycle: usize) -> PathBuf {
        self.run_dir.join(format!("snapshot-{cycle:04}.toml"))
    }

    fn commands_file(&self, cycle: usize) -> PathBuf {
        self.run_dir.join(format!("commands-{cycle:04}.msgpack"))
    }

    fn checkpoint_file(&self) -> PathBuf {
        self.run_dir.join("checkpoint.msgpack")
    }

    fn results_file(&self) -> PathBuf {
        self.run_dir.join("results.json")
    }
}

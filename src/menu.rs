//! Text menu driving both demos.
//!
//! Reads from any `BufRead` and writes to any `Write`, so a whole session can
//! be scripted in tests. End of input is treated like choosing "0".

use crate::config::DemoConfig;
use crate::error::{DemoError, InputError};
use crate::events::ConsoleSink;
use crate::pipeline::Pipeline;
use crate::race::{self, RaceSettings, Strategy};
use crate::trigger::CancelTrigger;
use colored::Colorize;
use std::io::{BufRead, Write};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuChoice {
    RaceCondition,
    ProducerConsumer,
    Exit,
    Invalid(String),
}

impl From<&str> for MenuChoice {
    fn from(line: &str) -> Self {
        match line.trim() {
            "1" => MenuChoice::RaceCondition,
            "2" => MenuChoice::ProducerConsumer,
            "0" => MenuChoice::Exit,
            other => MenuChoice::Invalid(other.to_string()),
        }
    }
}

pub fn parse_count(input: &str) -> Result<u64, InputError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(InputError::Empty);
    }
    match trimmed.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(InputError::NotANumber(trimmed.to_string())),
    }
}

/// `parse_count`, falling back to `fallback` for missing or unusable input.
pub fn count_or(input: Option<&str>, fallback: u64) -> u64 {
    match input.map(parse_count) {
        Some(Ok(n)) => n,
        Some(Err(err)) => {
            tracing::warn!(%err, fallback, "unusable number, using fallback");
            fallback
        }
        None => fallback,
    }
}

/// `count_or`, additionally treating answers above `max` as unusable.
pub fn count_at_most(input: Option<&str>, fallback: u64, max: u64) -> u64 {
    match input.map(parse_count) {
        Some(Ok(n)) if n > max => {
            let err = InputError::TooLarge { value: n, max };
            tracing::warn!(%err, fallback, "unusable number, using fallback");
            fallback
        }
        _ => count_or(input, fallback),
    }
}

pub fn is_yes(input: Option<&str>) -> bool {
    input.is_some_and(|answer| answer.trim().eq_ignore_ascii_case("y"))
}

pub type TriggerFactory = Box<dyn FnMut() -> Box<dyn CancelTrigger>>;

pub struct Menu<R, W> {
    input: R,
    output: W,
    config: DemoConfig,
    make_trigger: TriggerFactory,
}

impl<R: BufRead, W: Write + Send> Menu<R, W> {
    pub fn new(input: R, output: W, config: DemoConfig, make_trigger: TriggerFactory) -> Self {
        Self {
            input,
            output,
            config,
            make_trigger,
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Shows the menu until the user exits or input runs out.
    pub fn run(&mut self) -> Result<(), DemoError> {
        loop {
            writeln!(self.output, "\n{}", "Choose a demo:".bold())?;
            writeln!(self.output, "1 - Race condition")?;
            writeln!(self.output, "2 - Producer-consumer")?;
            writeln!(self.output, "0 - Exit")?;
            write!(self.output, "Your choice: ")?;
            self.output.flush()?;

            let Some(line) = self.read_line()? else {
                return Ok(());
            };
            let outcome = match MenuChoice::from(line.as_str()) {
                MenuChoice::RaceCondition => self.race_demo(),
                MenuChoice::ProducerConsumer => self.pipeline_demo(),
                MenuChoice::Exit => return Ok(()),
                MenuChoice::Invalid(other) => {
                    tracing::debug!(choice = %other, "invalid menu choice");
                    writeln!(self.output, "{}", "Invalid choice, try again.".red())?;
                    continue;
                }
            };
            match outcome {
                Err(err) if err.is_recoverable() => {
                    tracing::warn!(%err, "demo aborted");
                    writeln!(self.output, "{}", format!("Demo aborted: {err}").red())?;
                }
                other => other?,
            }
        }
    }

    fn read_line(&mut self) -> Result<Option<String>, DemoError> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn prompt(&mut self, question: &str) -> Result<Option<String>, DemoError> {
        write!(self.output, "{question}")?;
        self.output.flush()?;
        self.read_line()
    }

    fn race_demo(&mut self) -> Result<(), DemoError> {
        writeln!(self.output, "\n{}", "--- Race condition ---".cyan().bold())?;
        let defaults = self.config.race.clone();

        let threads = self.prompt("Number of threads: ")?;
        let threads = count_at_most(
            threads.as_deref(),
            defaults.threads as u64,
            defaults.max_threads as u64,
        );
        let increments = self.prompt("Increments per thread: ")?;
        let increments = count_or(increments.as_deref(), defaults.increments);
        let show_steps = self.prompt("Show steps? (y/n): ")?;

        let settings = RaceSettings {
            threads: usize::try_from(threads).unwrap_or(defaults.threads),
            increments,
            show_steps: is_yes(show_steps.as_deref()),
        };
        tracing::info!(?settings, "running race benchmark");

        let output = Mutex::new(&mut self.output);
        let on_step = |strategy: Strategy, value: u64| {
            let mut out = output.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(err) = writeln!(out, "{strategy} step: {value}") {
                tracing::warn!(%err, "failed to write step");
            }
        };
        let results = race::run_all(&settings, &on_step)?;

        let out = output.into_inner().unwrap_or_else(PoisonError::into_inner);
        for result in results {
            writeln!(out, "{result}")?;
        }
        Ok(())
    }

    fn pipeline_demo(&mut self) -> Result<(), DemoError> {
        writeln!(self.output, "\n{}", "--- Producer-consumer ---".cyan().bold())?;
        let mut trigger = (self.make_trigger)();
        if let Some(prompt) = trigger.prompt() {
            writeln!(self.output, "{prompt}")?;
        }

        let sink = ConsoleSink::new(&mut self.output);
        let pipeline = Pipeline::new(self.config.pipeline.clone());
        let report = pipeline.run(trigger.as_mut(), &sink)?;
        tracing::debug!(?report, "pipeline report");
        Ok(())
    }
}

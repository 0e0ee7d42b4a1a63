//! Mock State Store
//!
//! Everything a run's host capability mocks observe lands here: the queue of
//! scripted prompt responses, the console and alert logs, per-capability call
//! counters and the timer registry.
//!
//! A `MockState` is an ordinary value owned by whoever drives the sandbox. It
//! is reset before every script run and every function invocation, and two
//! concurrent runs must never share one instance.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

/// The host capabilities whose calls are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    Prompt,
    Alert,
    ConsoleLog,
    ConsoleTable,
    SetInterval,
    ClearInterval,
    SetTimeout,
    ClearTimeout,
}

impl Capability {
    pub const ALL: [Capability; 8] = [
        Capability::Prompt,
        Capability::Alert,
        Capability::ConsoleLog,
        Capability::ConsoleTable,
        Capability::SetInterval,
        Capability::ClearInterval,
        Capability::SetTimeout,
        Capability::ClearTimeout,
    ];

    /// Name as it appears in serialized call counts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Prompt => "prompt",
            Capability::Alert => "alert",
            Capability::ConsoleLog => "consoleLog",
            Capability::ConsoleTable => "consoleTable",
            Capability::SetInterval => "setInterval",
            Capability::ClearInterval => "clearInterval",
            Capability::SetTimeout => "setTimeout",
            Capability::ClearTimeout => "clearTimeout",
        }
    }
}

impl std::str::FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown capability '{s}'"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallCounts {
    pub prompt: u32,
    pub alert: u32,
    pub console_log: u32,
    pub console_table: u32,
    pub set_interval: u32,
    pub clear_interval: u32,
    pub set_timeout: u32,
    pub clear_timeout: u32,
    /// Timer id to number of callback executions.
    pub timer_callbacks: BTreeMap<u32, u32>,
}

impl CallCounts {
    pub fn get(&self, capability: Capability) -> u32 {
        match capability {
            Capability::Prompt => self.prompt,
            Capability::Alert => self.alert,
            Capability::ConsoleLog => self.console_log,
            Capability::ConsoleTable => self.console_table,
            Capability::SetInterval => self.set_interval,
            Capability::ClearInterval => self.clear_interval,
            Capability::SetTimeout => self.set_timeout,
            Capability::ClearTimeout => self.clear_timeout,
        }
    }

    fn slot(&mut self, capability: Capability) -> &mut u32 {
        match capability {
            Capability::Prompt => &mut self.prompt,
            Capability::Alert => &mut self.alert,
            Capability::ConsoleLog => &mut self.console_log,
            Capability::ConsoleTable => &mut self.console_table,
            Capability::SetInterval => &mut self.set_interval,
            Capability::ClearInterval => &mut self.clear_interval,
            Capability::SetTimeout => &mut self.set_timeout,
            Capability::ClearTimeout => &mut self.clear_timeout,
        }
    }

    /// Fires recorded for one timer id; unknown ids have fired zero times.
    pub fn timer_fires(&self, id: u32) -> u32 {
        self.timer_callbacks.get(&id).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerRecord {
    pub is_active: bool,
    pub invocation_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockState {
    input_queue: VecDeque<String>,
    console_output: Vec<String>,
    alert_output: Vec<String>,
    all_output: Vec<String>,
    call_counts: CallCounts,
    timers: BTreeMap<u32, TimerRecord>,
    next_timer_id: u32,
}

impl Default for MockState {
    fn default() -> Self {
        Self::new()
    }
}

impl MockState {
    pub fn new() -> Self {
        Self {
            input_queue: VecDeque::new(),
            console_output: Vec::new(),
            alert_output: Vec::new(),
            all_output: Vec::new(),
            call_counts: CallCounts::default(),
            timers: BTreeMap::new(),
            next_timer_id: 1,
        }
    }

    /// Clears every log, counter and timer and restarts timer ids at 1.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Queues scripted answers for `prompt`, consumed first in first out.
    pub fn load_responses<I, S>(&mut self, responses: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_queue.extend(responses.into_iter().map(Into::into));
    }

    pub fn next_response(&mut self) -> Option<String> {
        self.input_queue.pop_front()
    }

    pub fn count(&mut self, capability: Capability) {
        *self.call_counts.slot(capability) += 1;
    }

    pub fn record_console(&mut self, line: String) {
        self.all_output.push(line.clone());
        self.console_output.push(line);
    }

    pub fn record_alert(&mut self, message: String) {
        self.console_output.push(format!("ALERT: {message}"));
        self.all_output.push(message.clone());
        self.alert_output.push(message);
    }

    pub fn record_prompt(&mut self, message: &str) {
        self.record_console(format!("PROMPT: {message}"));
    }

    pub fn record_table(&mut self, rendered: &str) {
        self.record_console(format!("TABLE: {rendered}"));
    }

    /// Registers a new active timer and returns its id.
    pub fn start_timer(&mut self) -> u32 {
        let id = self.next_timer_id;
        self.next_timer_id += 1;
        self.timers.insert(
            id,
            TimerRecord {
                is_active: true,
                invocation_count: 0,
            },
        );
        id
    }

    /// Marks a timer inactive; unknown ids are ignored.
    pub fn stop_timer(&mut self, id: u32) {
        if let Some(timer) = self.timers.get_mut(&id) {
            timer.is_active = false;
        }
    }

    pub fn timer(&self, id: u32) -> Option<TimerRecord> {
        self.timers.get(&id).copied()
    }

    pub fn is_timer_active(&self, id: u32) -> bool {
        self.timers.get(&id).is_some_and(|t| t.is_active)
    }

    pub fn record_timer_fire(&mut self, id: u32) {
        if let Some(timer) = self.timers.get_mut(&id) {
            timer.invocation_count += 1;
        }
        *self.call_counts.timer_callbacks.entry(id).or_insert(0) += 1;
    }

    pub fn console_output(&self) -> &[String] {
        &self.console_output
    }

    pub fn alert_output(&self) -> &[String] {
        &self.alert_output
    }

    pub fn all_output(&self) -> &[String] {
        &self.all_output
    }

    pub fn call_counts(&self) -> &CallCounts {
        &self.call_counts
    }

    pub fn timers(&self) -> &BTreeMap<u32, TimerRecord> {
        &self.timers
    }

    pub fn pending_responses(&self) -> usize {
        self.input_queue.len()
    }
}

//! Scheduling policies.

use core::fmt;
use core::str::FromStr;

use crate::errors::ConfigError;

extern crate alloc;
use alloc::string::String;

/// The closed set of selection policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedPolicy {
    /// First come, first served
    #[default]
    Fifo,
    /// Ready queue kept sorted by static priority
    Priority,
    /// Ready queue kept sorted by predicted burst length
    ShortestJobFirst,
    /// FIFO order, preempted when the quantum expires
    RoundRobin,
    /// FIFO admission, lowest priority value found by scanning at selection
    PriorityMinimumScan,
}

impl SchedPolicy {
    /// Every policy, in declaration order.
    pub const ALL: [SchedPolicy; 5] = [
        SchedPolicy::Fifo,
        SchedPolicy::Priority,
        SchedPolicy::ShortestJobFirst,
        SchedPolicy::RoundRobin,
        SchedPolicy::PriorityMinimumScan,
    ];

    /// Map a numeric code from a batch file header.
    ///
    /// `1` is FIFO, `2` SJF, `3..=6` round robin and `7..=10` the priority
    /// scan. The sorted priority policy has no code and is selected by name.
    pub fn from_code(code: i64) -> Result<Self, ConfigError> {
        match code {
            1 => Ok(SchedPolicy::Fifo),
            2 => Ok(SchedPolicy::ShortestJobFirst),
            3..=6 => Ok(SchedPolicy::RoundRobin),
            7..=10 => Ok(SchedPolicy::PriorityMinimumScan),
            _ => Err(ConfigError::UnknownPolicyCode(code)),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SchedPolicy::Fifo => "fifo",
            SchedPolicy::Priority => "priority",
            SchedPolicy::ShortestJobFirst => "sjf",
            SchedPolicy::RoundRobin => "round-robin",
            SchedPolicy::PriorityMinimumScan => "priority-scan",
        }
    }

    /// Whether the timer quantum preempts the running thread.
    pub fn is_preemptive(self) -> bool {
        matches!(self, SchedPolicy::RoundRobin)
    }
}

impl fmt::Display for SchedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SchedPolicy {
    type Err = ConfigError;

    /// Parse a policy name (case-insensitive) or a numeric code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<i64>() {
            return Self::from_code(code);
        }
        let lower = s.to_ascii_lowercase();
        match lower.as_str() {
            "fifo" | "fcfs" => Ok(SchedPolicy::Fifo),
            "priority" => Ok(SchedPolicy::Priority),
            "sjf" | "shortest-job-first" => Ok(SchedPolicy::ShortestJobFirst),
            "rr" | "round-robin" => Ok(SchedPolicy::RoundRobin),
            "priority-scan" => Ok(SchedPolicy::PriorityMinimumScan),
            _ => Err(ConfigError::UnknownPolicy(String::from(s))),
        }
    }
}

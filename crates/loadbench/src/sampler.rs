//! Per-batch memory and CPU readings for the loading process
//!
//! Sampling is synchronous and happens between batches, never concurrently
//! with a load. Each call appends to all four series at once, so the raw and
//! spike series always have the same length.

use sysinfo::{Pid, System};
use tracing::warn;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One point-in-time reading
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sample {
    pub memory_mb: f64,
    pub cpu_percent: f64,
}

/// Source of resource readings
pub trait ResourceProbe {
    /// Current reading, or `None` when the OS could not be queried
    fn read(&mut self) -> Option<Sample>;
}

/// Reads resident memory and CPU usage of the current process via `sysinfo`
pub struct ProcessProbe {
    system: System,
    pid: Option<Pid>,
}

impl ProcessProbe {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                warn!(error = e, "Cannot resolve current pid; resource readings will be zero");
                None
            },
        };

        let mut probe = Self {
            system: System::new(),
            pid,
        };
        // CPU usage is a delta between refreshes; take the baseline now
        probe.refresh();
        probe
    }

    fn refresh(&mut self) -> bool {
        match self.pid {
            Some(pid) => self.system.refresh_process(pid),
            None => false,
        }
    }
}

impl Default for ProcessProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProbe for ProcessProbe {
    fn read(&mut self) -> Option<Sample> {
        if !self.refresh() {
            return None;
        }

        let process = self.system.process(self.pid?)?;
        Some(Sample {
            memory_mb: process.memory() as f64 / BYTES_PER_MB,
            cpu_percent: f64::from(process.cpu_usage()),
        })
    }
}

/// Running maximum of a sampled metric
///
/// `values()[i] == max(values()[i - 1], sample i)`, computed in O(1) per push.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpikeSeries {
    values: Vec<f64>,
}

impl SpikeSeries {
    pub fn push(&mut self, sample: f64) {
        let spike = match self.values.last() {
            Some(&last) => last.max(sample),
            None => sample,
        };
        self.values.push(spike);
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// Everything recorded by a [`ResourceSampler`] over one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSeries {
    pub memory_samples: Vec<f64>,
    pub memory_spikes: Vec<f64>,
    pub cpu_samples: Vec<f64>,
    pub cpu_spikes: Vec<f64>,
}

/// Collects one [`Sample`] per call plus the derived spike series
pub struct ResourceSampler<P> {
    probe: P,
    memory_samples: Vec<f64>,
    cpu_samples: Vec<f64>,
    memory_spikes: SpikeSeries,
    cpu_spikes: SpikeSeries,
    failed_reads: usize,
}

impl<P: ResourceProbe> ResourceSampler<P> {
    pub fn new(probe: P) -> Self {
        Self {
            probe,
            memory_samples: Vec::new(),
            cpu_samples: Vec::new(),
            memory_spikes: SpikeSeries::default(),
            cpu_spikes: SpikeSeries::default(),
            failed_reads: 0,
        }
    }

    /// Take one reading and append it to every series
    ///
    /// A failed read is recorded as zero; it never fails the run.
    pub fn sample(&mut self) -> Sample {
        let sample = self.probe.read().unwrap_or_else(|| {
            self.failed_reads += 1;
            warn!(failed_reads = self.failed_reads, "Resource read failed; recording zero");
            Sample::default()
        });

        self.memory_samples.push(sample.memory_mb);
        self.cpu_samples.push(sample.cpu_percent);
        self.memory_spikes.push(sample.memory_mb);
        self.cpu_spikes.push(sample.cpu_percent);

        sample
    }

    pub fn len(&self) -> usize {
        self.memory_samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory_samples.is_empty()
    }

    pub fn failed_reads(&self) -> usize {
        self.failed_reads
    }

    /// Highest raw memory reading, 0.0 before any sample
    pub fn peak_memory_mb(&self) -> f64 {
        peak(&self.memory_samples)
    }

    /// Highest raw CPU reading, 0.0 before any sample
    pub fn peak_cpu_percent(&self) -> f64 {
        peak(&self.cpu_samples)
    }

    /// Copy of every series recorded so far
    pub fn series(&self) -> SampleSeries {
        SampleSeries {
            memory_samples: self.memory_samples.clone(),
            memory_spikes: self.memory_spikes.values().to_vec(),
            cpu_samples: self.cpu_samples.clone(),
            cpu_spikes: self.cpu_spikes.values().to_vec(),
        }
    }
}

fn peak(values: &[f64]) -> f64 {
    values.iter().copied().fold(0.0, f64::max)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays scripted readings; `None` entries simulate failed reads
    struct ScriptedProbe(VecDeque<Option<Sample>>);

    impl ScriptedProbe {
        fn new(readings: &[Option<(f64, f64)>]) -> Self {
            Self(
                readings
                    .iter()
                    .map(|r| {
                        r.map(|(memory_mb, cpu_percent)| Sample {
                            memory_mb,
                            cpu_percent,
                        })
                    })
                    .collect(),
            )
        }
    }

    impl ResourceProbe for ScriptedProbe {
        fn read(&mut self) -> Option<Sample> {
            self.0.pop_front().flatten()
        }
    }

    #[test]
    fn test_spike_series_is_running_max() {
        let mut spikes = SpikeSeries::default();
        for value in [3.0, 1.0, 4.0, 1.0, 5.0, 2.0] {
            spikes.push(value);
        }
        assert_eq!(spikes.values(), &[3.0, 3.0, 4.0, 4.0, 5.0, 5.0]);
        assert_eq!(spikes.last(), Some(5.0));
    }

    #[test]
    fn test_first_spike_equals_first_sample() {
        let mut spikes = SpikeSeries::default();
        spikes.push(-1.5);
        assert_eq!(spikes.values(), &[-1.5]);
    }

    #[test]
    fn test_series_stay_aligned_and_monotonic() {
        let mut sampler = ResourceSampler::new(ScriptedProbe::new(&[
            Some((50.0, 10.0)),
            Some((80.0, 5.0)),
            None,
            Some((70.0, 95.0)),
        ]));
        for _ in 0..4 {
            sampler.sample();
        }

        assert_eq!(sampler.len(), 4);
        assert_eq!(sampler.failed_reads(), 1);
        assert_eq!(sampler.peak_memory_mb(), 80.0);
        assert_eq!(sampler.peak_cpu_percent(), 95.0);

        let series = sampler.series();
        assert_eq!(series.memory_samples, vec![50.0, 80.0, 0.0, 70.0]);
        assert_eq!(series.memory_spikes, vec![50.0, 80.0, 80.0, 80.0]);
        assert_eq!(series.cpu_samples, vec![10.0, 5.0, 0.0, 95.0]);
        assert_eq!(series.cpu_spikes, vec![10.0, 10.0, 10.0, 95.0]);

        for (samples, spikes) in [
            (&series.memory_samples, &series.memory_spikes),
            (&series.cpu_samples, &series.cpu_spikes),
        ] {
            assert_eq!(samples.len(), spikes.len());
            for i in 0..spikes.len() {
                assert!(spikes[i] >= samples[i]);
                if i > 0 {
                    assert!(spikes[i] >= spikes[i - 1]);
                }
            }
        }
    }

    #[test]
    fn test_peaks_default_to_zero() {
        let sampler = ResourceSampler::new(ScriptedProbe::new(&[]));
        assert!(sampler.is_empty());
        assert_eq!(sampler.peak_memory_mb(), 0.0);
        assert_eq!(sampler.peak_cpu_percent(), 0.0);
    }

    #[test]
    fn test_process_probe_reports_resident_memory() {
        let mut probe = ProcessProbe::new();
        let sample = probe.read().expect("current process should be readable");
        assert!(sample.memory_mb > 0.0);
        assert!(sample.cpu_percent >= 0.0);
    }
}

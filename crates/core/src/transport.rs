//! Collective communication between cooperating ranks.
//!
//! The distributed codec talks to its peers only through [`GroupContext`]:
//! broadcast, scatter, all-reduce-sum, and two gathers. Every collective is a
//! synchronization point; all ranks must call the same collectives in the
//! same order.
//!
//! [`LocalGroup`] implements the trait for ranks running as threads of one
//! process. Ranks exchange data through per-rank deposit slots and meet at a
//! rendezvous barrier twice per collective: once after depositing, once after
//! collecting.
//!
//! # Jitter
//!
//! A seeded ChaCha8 RNG can delay each rank by a random amount before every
//! collective. Results never depend on arrival order, and jitter exists to
//! exercise exactly that. Given the same seed the delays are reproducible.

use crate::error::{Error, GroupError, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use tracing::trace;

/// Collective operations over a fixed group of ranks.
pub trait GroupContext {
    /// This rank's index, `0..size()`.
    fn rank(&self) -> usize;

    /// Number of ranks in the group.
    fn size(&self) -> usize;

    /// Replace `data` on every rank with the root's `data`.
    fn broadcast(&mut self, data: &mut Vec<u8>, root: usize) -> Result<()>;

    /// Split the root's `send` into `size()` equal pieces; rank `r` receives
    /// piece `r` into `recv`. `send` is ignored on other ranks.
    fn scatter(&mut self, send: &[u8], recv: &mut [u8], root: usize) -> Result<()>;

    /// Element-wise sum of `values` across all ranks, result on every rank.
    fn all_reduce_sum(&mut self, values: &mut [u64]) -> Result<()>;

    /// Collect one value per rank at the root, in rank order. Other ranks get
    /// an empty vector.
    fn gather(&mut self, value: u64, root: usize) -> Result<Vec<u64>>;

    /// Concatenate every rank's `data` at the root, in rank order. `sizes`
    /// (significant at the root only) must match each rank's length.
    fn gather_variable(&mut self, data: &[u8], sizes: &[u64], root: usize) -> Result<Vec<u8>>;
}

/// Configuration for an in-process group.
#[derive(Debug, Clone, Copy)]
pub struct LocalGroupConfig {
    /// Number of ranks
    pub size: usize,

    /// Upper bound of the random delay before each collective (microseconds)
    pub max_jitter_us: u64,

    /// Random seed for the delays
    pub seed: u64,
}

impl LocalGroupConfig {
    /// A group of `size` ranks with no artificial delay.
    pub fn perfect(size: usize) -> Self {
        Self {
            size,
            max_jitter_us: 0,
            seed: 0,
        }
    }

    /// A group of `size` ranks that stalls each rank up to `max_jitter_us`
    /// before every collective.
    pub fn jittered(size: usize, max_jitter_us: u64, seed: u64) -> Self {
        Self {
            size,
            max_jitter_us,
            seed,
        }
    }
}

/// Reusable barrier that releases waiters with an error once any rank leaves.
#[derive(Debug)]
struct Rendezvous {
    size: usize,
    state: Mutex<RendezvousState>,
    turnstile: Condvar,
}

#[derive(Debug, Default)]
struct RendezvousState {
    arrived: usize,
    generation: u64,
    abandoned: bool,
}

impl Rendezvous {
    fn new(size: usize) -> Self {
        Self {
            size,
            state: Mutex::new(RendezvousState::default()),
            turnstile: Condvar::new(),
        }
    }

    fn wait(&self) -> Result<()> {
        let mut state = self.state.lock().map_err(|_| GroupError::Poisoned)?;
        if state.abandoned {
            return Err(GroupError::Abandoned.into());
        }

        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.size {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.turnstile.notify_all();
            return Ok(());
        }

        // A completed generation wins over a later departure.
        while state.generation == generation {
            if state.abandoned {
                return Err(GroupError::Abandoned.into());
            }
            state = self
                .turnstile
                .wait(state)
                .map_err(|_| GroupError::Poisoned)?;
        }
        Ok(())
    }

    fn abandon(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.abandoned = true;
        }
        self.turnstile.notify_all();
    }
}

/// State shared by every rank of a [`LocalGroup`].
#[derive(Debug)]
struct Exchange {
    size: usize,
    bytes: Mutex<Vec<Vec<u8>>>,
    words: Mutex<Vec<Vec<u64>>>,
    rendezvous: Rendezvous,
}

impl Exchange {
    fn new(size: usize) -> Self {
        Self {
            size,
            bytes: Mutex::new(vec![Vec::new(); size]),
            words: Mutex::new(vec![Vec::new(); size]),
            rendezvous: Rendezvous::new(size),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| GroupError::Poisoned.into())
}

#[derive(Debug)]
struct Jitter {
    rng: ChaCha8Rng,
    max_us: u64,
}

/// One rank's handle on an in-process group.
///
/// Dropping a handle (normally or while unwinding from a panic) releases any
/// rank still blocked in a collective with [`GroupError::Abandoned`].
#[derive(Debug)]
pub struct LocalGroup {
    rank: usize,
    exchange: Arc<Exchange>,
    jitter: Option<Jitter>,
}

impl LocalGroup {
    fn new(rank: usize, exchange: Arc<Exchange>, config: &LocalGroupConfig) -> Self {
        let jitter = (config.max_jitter_us > 0).then(|| {
            let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
            rng.set_stream(rank as u64);
            Jitter {
                rng,
                max_us: config.max_jitter_us,
            }
        });
        Self {
            rank,
            exchange,
            jitter,
        }
    }

    /// A group of one. Every collective completes immediately.
    pub fn single() -> Self {
        Self::new(0, Arc::new(Exchange::new(1)), &LocalGroupConfig::perfect(1))
    }

    /// Run `f` on `config.size` ranks, one scoped thread each.
    ///
    /// # Returns
    /// Each rank's result, in rank order.
    ///
    /// # Errors
    /// - `GroupError::EmptyGroup` for a size of zero
    /// - `GroupError::RankPanicked` if a rank's thread panicked
    /// - otherwise the first error a rank returned, preferring a root cause
    ///   over the `Abandoned` errors it triggers in its peers
    pub fn run<T, F>(config: LocalGroupConfig, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(&mut LocalGroup) -> Result<T> + Sync,
    {
        if config.size == 0 {
            return Err(GroupError::EmptyGroup.into());
        }
        let exchange = Arc::new(Exchange::new(config.size));

        thread::scope(|scope| {
            let f = &f;
            let handles: Vec<_> = (0..config.size)
                .map(|rank| {
                    let mut group = LocalGroup::new(rank, Arc::clone(&exchange), &config);
                    scope.spawn(move || f(&mut group))
                })
                .collect();

            let mut results = Vec::with_capacity(config.size);
            let mut errors = Vec::new();
            for (rank, handle) in handles.into_iter().enumerate() {
                match handle.join() {
                    Ok(Ok(value)) => results.push(value),
                    Ok(Err(e)) => errors.push(e),
                    Err(_) => errors.push(GroupError::RankPanicked(rank).into()),
                }
            }

            if errors.is_empty() {
                return Ok(results);
            }
            let root_cause = errors
                .iter()
                .position(|e| !matches!(e, Error::Group(GroupError::Abandoned)))
                .unwrap_or(0);
            Err(errors.swap_remove(root_cause))
        })
    }

    fn check_root(&self, root: usize) -> Result<()> {
        if root >= self.exchange.size {
            return Err(GroupError::RankOutOfRange {
                rank: root,
                size: self.exchange.size,
            }
            .into());
        }
        Ok(())
    }

    fn stall(&mut self) {
        if let Some(jitter) = self.jitter.as_mut() {
            let delay = jitter.rng.gen_range(0..=jitter.max_us);
            thread::sleep(Duration::from_micros(delay));
        }
    }

    fn sync(&self) -> Result<()> {
        self.exchange.rendezvous.wait()
    }
}

impl Drop for LocalGroup {
    fn drop(&mut self) {
        self.exchange.rendezvous.abandon();
    }
}

impl GroupContext for LocalGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.exchange.size
    }

    fn broadcast(&mut self, data: &mut Vec<u8>, root: usize) -> Result<()> {
        self.check_root(root)?;
        self.stall();
        trace!(rank = self.rank, root, "broadcast");

        if self.rank == root {
            lock(&self.exchange.bytes)?[root] = data.clone();
        }
        self.sync()?;
        if self.rank != root {
            data.clone_from(&lock(&self.exchange.bytes)?[root]);
        }
        self.sync()
    }

    fn scatter(&mut self, send: &[u8], recv: &mut [u8], root: usize) -> Result<()> {
        self.check_root(root)?;
        self.stall();
        trace!(rank = self.rank, root, piece = recv.len(), "scatter");

        if self.rank == root {
            lock(&self.exchange.bytes)?[root] = send.to_vec();
        }
        self.sync()?;
        let outcome = {
            let slots = lock(&self.exchange.bytes)?;
            let source = &slots[root];
            let expected = recv.len() * self.exchange.size;
            if source.len() == expected {
                let start = self.rank * recv.len();
                recv.copy_from_slice(&source[start..start + recv.len()]);
                Ok(())
            } else {
                Err(GroupError::SizeMismatch {
                    operation: "scatter",
                    expected,
                    actual: source.len(),
                }
                .into())
            }
        };
        self.sync()?;
        outcome
    }

    fn all_reduce_sum(&mut self, values: &mut [u64]) -> Result<()> {
        self.stall();
        trace!(rank = self.rank, len = values.len(), "all_reduce_sum");

        lock(&self.exchange.words)?[self.rank] = values.to_vec();
        self.sync()?;
        let outcome = {
            let slots = lock(&self.exchange.words)?;
            match slots.iter().find(|slot| slot.len() != values.len()) {
                Some(slot) => Err(GroupError::SizeMismatch {
                    operation: "all_reduce_sum",
                    expected: values.len(),
                    actual: slot.len(),
                }
                .into()),
                None => {
                    values.fill(0);
                    for slot in slots.iter() {
                        for (total, &value) in values.iter_mut().zip(slot) {
                            *total = total.wrapping_add(value);
                        }
                    }
                    Ok(())
                }
            }
        };
        self.sync()?;
        outcome
    }

    fn gather(&mut self, value: u64, root: usize) -> Result<Vec<u64>> {
        self.check_root(root)?;
        self.stall();
        trace!(rank = self.rank, root, value, "gather");

        lock(&self.exchange.words)?[self.rank] = vec![value];
        self.sync()?;
        let gathered = if self.rank == root {
            lock(&self.exchange.words)?
                .iter()
                .map(|slot| slot.first().copied().unwrap_or(0))
                .collect()
        } else {
            Vec::new()
        };
        self.sync()?;
        Ok(gathered)
    }

    fn gather_variable(&mut self, data: &[u8], sizes: &[u64], root: usize) -> Result<Vec<u8>> {
        self.check_root(root)?;
        self.stall();
        trace!(rank = self.rank, root, len = data.len(), "gather_variable");

        lock(&self.exchange.bytes)?[self.rank] = data.to_vec();
        self.sync()?;
        let outcome = if self.rank == root {
            let slots = lock(&self.exchange.bytes)?;
            concatenate(&slots, sizes)
        } else {
            Ok(Vec::new())
        };
        self.sync()?;
        outcome
    }
}

/// Join deposit slots in rank order after checking them against `sizes`.
fn concatenate(slots: &[Vec<u8>], sizes: &[u64]) -> Result<Vec<u8>> {
    if sizes.len() != slots.len() {
        return Err(GroupError::SizeMismatch {
            operation: "gather_variable",
            expected: slots.len(),
            actual: sizes.len(),
        }
        .into());
    }
    if let Some((slot, &size)) = slots
        .iter()
        .zip(sizes)
        .find(|(slot, &size)| slot.len() as u64 != size)
    {
        return Err(GroupError::SizeMismatch {
            operation: "gather_variable",
            expected: size as usize,
            actual: slot.len(),
        }
        .into());
    }

    let total = sizes.iter().sum::<u64>() as usize;
    let mut joined = Vec::with_capacity(total);
    for slot in slots {
        joined.extend_from_slice(slot);
    }
    Ok(joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_rank() {
        let mut group = LocalGroup::single();
        assert_eq!(group.rank(), 0);
        assert_eq!(group.size(), 1);

        let mut data = vec![1, 2, 3];
        group.broadcast(&mut data, 0).unwrap();
        assert_eq!(data, vec![1, 2, 3]);

        let mut piece = [0u8; 3];
        group.scatter(&[7, 8, 9], &mut piece, 0).unwrap();
        assert_eq!(piece, [7, 8, 9]);

        let mut values = [4, 5];
        group.all_reduce_sum(&mut values).unwrap();
        assert_eq!(values, [4, 5]);

        assert_eq!(group.gather(42, 0).unwrap(), vec![42]);
        assert_eq!(group.gather_variable(b"xy", &[2], 0).unwrap(), b"xy");
    }

    #[test]
    fn test_broadcast() {
        let results = LocalGroup::run(LocalGroupConfig::perfect(4), |group| {
            let mut data = if group.rank() == 2 {
                b"from two".to_vec()
            } else {
                Vec::new()
            };
            group.broadcast(&mut data, 2)?;
            Ok(data)
        })
        .unwrap();

        assert!(results.iter().all(|data| data == b"from two"));
    }

    #[test]
    fn test_scatter() {
        let results = LocalGroup::run(LocalGroupConfig::perfect(3), |group| {
            let send: Vec<u8> = if group.rank() == 0 {
                (0..6).collect()
            } else {
                Vec::new()
            };
            let mut piece = [0u8; 2];
            group.scatter(&send, &mut piece, 0)?;
            Ok(piece)
        })
        .unwrap();

        assert_eq!(results, vec![[0, 1], [2, 3], [4, 5]]);
    }

    #[test]
    fn test_scatter_size_mismatch_reaches_every_rank() {
        let result = LocalGroup::run(LocalGroupConfig::perfect(3), |group| {
            let send = if group.rank() == 0 { vec![0u8; 5] } else { Vec::new() };
            let mut piece = [0u8; 2];
            group.scatter(&send, &mut piece, 0)
        });

        assert!(matches!(
            result,
            Err(Error::Group(GroupError::SizeMismatch {
                operation: "scatter",
                expected: 6,
                actual: 5
            }))
        ));
    }

    #[test]
    fn test_all_reduce_sum() {
        let results = LocalGroup::run(LocalGroupConfig::perfect(4), |group| {
            let rank = group.rank() as u64;
            let mut values = [rank, 10 * rank, 1];
            group.all_reduce_sum(&mut values)?;
            Ok(values)
        })
        .unwrap();

        assert!(results.iter().all(|v| *v == [6, 60, 4]));
    }

    #[test]
    fn test_gathers() {
        let results = LocalGroup::run(LocalGroupConfig::perfect(3), |group| {
            let data = vec![b'a' + group.rank() as u8; group.rank() + 1];
            let sizes = group.gather(data.len() as u64, 0)?;
            let joined = group.gather_variable(&data, &sizes, 0)?;
            Ok((sizes, joined))
        })
        .unwrap();

        assert_eq!(results[0].0, vec![1, 2, 3]);
        assert_eq!(results[0].1, b"abbccc");
        assert!(results[1].0.is_empty() && results[1].1.is_empty());
        assert!(results[2].0.is_empty() && results[2].1.is_empty());
    }

    #[test]
    fn test_gather_variable_rejects_wrong_sizes() {
        let result = LocalGroup::run(LocalGroupConfig::perfect(2), |group| {
            group.gather_variable(b"abc", &[3, 4], 0)
        });

        assert!(matches!(
            result,
            Err(Error::Group(GroupError::SizeMismatch {
                operation: "gather_variable",
                ..
            }))
        ));
    }

    #[test]
    fn test_root_out_of_range() {
        let mut group = LocalGroup::single();
        let result = group.broadcast(&mut Vec::new(), 1);
        assert!(matches!(
            result,
            Err(Error::Group(GroupError::RankOutOfRange { rank: 1, size: 1 }))
        ));
    }

    #[test]
    fn test_empty_group() {
        let result = LocalGroup::run(LocalGroupConfig::perfect(0), |_| Ok(()));
        assert!(matches!(result, Err(Error::Group(GroupError::EmptyGroup))));
    }

    #[test]
    fn test_departed_rank_releases_peers() {
        let result = LocalGroup::run(LocalGroupConfig::perfect(3), |group| {
            if group.rank() == 1 {
                return Err(GroupError::EmptyGroup.into());
            }
            let mut values = [1u64];
            group.all_reduce_sum(&mut values)
        });

        assert!(matches!(result, Err(Error::Group(GroupError::EmptyGroup))));
    }

    #[test]
    fn test_panicking_rank() {
        let result = LocalGroup::run(LocalGroupConfig::perfect(2), |group| {
            if group.rank() == 1 {
                panic!("rank 1 gives up");
            }
            group.gather(1, 0)
        });

        assert!(matches!(result, Err(Error::Group(GroupError::RankPanicked(1)))));
    }

    #[test]
    fn test_jitter_does_not_change_results() {
        let run = |config| {
            LocalGroup::run(config, |group| {
                let mut total = [group.rank() as u64 + 1];
                for _ in 0..5 {
                    group.all_reduce_sum(&mut total)?;
                }
                let sizes = group.gather(total[0], 0)?;
                Ok((total[0], sizes))
            })
            .unwrap()
        };

        let calm = run(LocalGroupConfig::perfect(4));
        let shaky = run(LocalGroupConfig::jittered(4, 200, 99));
        assert_eq!(calm, shaky);
        assert_eq!(calm[0].0, 10 * 4 * 4 * 4 * 4);
    }
}

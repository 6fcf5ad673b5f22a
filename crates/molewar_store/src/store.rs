//! # The Player Store
//!
//! Durable, concurrent home of every player aggregate. An in-memory map
//! of per-player mutexes backed by the append-only [`Journal`].
//!
//! ## Design principles
//!
//! 1. **Single writer per aggregate** - each player sits behind its own
//!    mutex; a commit holds it for the whole read-transform-persist cycle
//! 2. **Journal before publish** - the post-transition snapshot is on disk
//!    before any other reader can observe it
//! 3. **Deterministic pair order** - two-player commits lock the
//!    lexicographically lower identity first, so crossing attacks can
//!    never deadlock
//! 4. **Lazy shield expiry** - every access clears a lapsed shield on the
//!    stored aggregate and persists the clear

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use molewar_engine::{Clock, EconomyResult, NewPlayer, Player, PlayerId, Timestamp};
use parking_lot::{Mutex, RwLock};

use crate::error::{StoreError, StoreResult};
use crate::journal::Journal;

/// Durable concurrent directory of player aggregates.
pub struct PlayerStore {
    clock: Arc<dyn Clock>,
    journal: Journal,
    players: RwLock<HashMap<PlayerId, Arc<Mutex<Player>>>>,
}

impl PlayerStore {
    /// Opens the store, replaying the journal at `path` into memory.
    ///
    /// # Errors
    ///
    /// Fails when the journal cannot be opened or its header is invalid.
    pub fn open(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> StoreResult<Self> {
        let (journal, replayed) = Journal::open(path)?;
        let players = replayed
            .into_iter()
            .map(|(id, player)| (id, Arc::new(Mutex::new(player))))
            .collect::<HashMap<_, _>>();
        if !players.is_empty() {
            tracing::info!(players = players.len(), "player store restored");
        }
        Ok(Self {
            clock,
            journal,
            players: RwLock::new(players),
        })
    }

    /// Returns the existing aggregate for `profile.id`, or creates and
    /// persists a fresh one with `starting_points`.
    ///
    /// # Errors
    ///
    /// Fails only when journaling the newly created aggregate fails.
    pub fn get_or_create(&self, profile: NewPlayer, starting_points: u64) -> StoreResult<Player> {
        if let Some(cell) = self.cell(&profile.id) {
            return Ok(self.refreshed(&cell)?);
        }

        let mut players = self.players.write();
        // Double check: another thread may have created it between locks.
        if let Some(cell) = players.get(&profile.id).cloned() {
            drop(players);
            return Ok(self.refreshed(&cell)?);
        }

        let player = Player::create(profile, starting_points, self.clock.now());
        self.journal.append_one(&player)?;
        tracing::info!(player = %player.id, "new player registered");
        players.insert(player.id.clone(), Arc::new(Mutex::new(player.clone())));
        Ok(player)
    }

    /// Returns a snapshot of one aggregate.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown identity.
    pub fn get(&self, id: &PlayerId) -> StoreResult<Player> {
        let cell = self
            .cell(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        self.refreshed(&cell)
    }

    /// Applies a fallible transform to one aggregate under its lock.
    ///
    /// The transform runs on a scratch copy; on success the result is
    /// journaled and only then published. On rejection the aggregate is
    /// untouched except for a lazily expired shield, which is persisted
    /// either way.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`], the transform's own rejection, or a
    /// journal failure.
    pub fn commit<T>(
        &self,
        id: &PlayerId,
        transform: impl FnOnce(&mut Player, Timestamp) -> EconomyResult<T>,
    ) -> StoreResult<(Player, T)> {
        let cell = self
            .cell(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let now = self.clock.now();

        let mut guard = cell.lock();
        let mut base = guard.clone();
        let expired = base.expire_shield(now);

        let mut work = base.clone();
        match transform(&mut work, now) {
            Ok(value) => {
                self.journal.append_one(&work)?;
                *guard = work.clone();
                Ok((work, value))
            }
            Err(err) => {
                if expired {
                    self.journal.append_one(&base)?;
                    *guard = base;
                }
                Err(StoreError::Rejected(err))
            }
        }
    }

    /// Applies a fallible transform to two distinct aggregates atomically.
    ///
    /// Both locks are taken in identity order and held across the journal
    /// append and both publishes, so no reader ever observes one side of
    /// the transfer without the other.
    ///
    /// # Errors
    ///
    /// [`StoreError::AliasedPair`] when both identities are equal,
    /// [`StoreError::NotFound`] for either unknown identity, the
    /// transform's rejection, or a journal failure.
    pub fn commit_pair<T>(
        &self,
        id_a: &PlayerId,
        id_b: &PlayerId,
        transform: impl FnOnce(&mut Player, &mut Player, Timestamp) -> EconomyResult<T>,
    ) -> StoreResult<(Player, Player, T)> {
        if id_a == id_b {
            return Err(StoreError::AliasedPair);
        }
        let cell_a = self
            .cell(id_a)
            .ok_or_else(|| StoreError::NotFound(id_a.clone()))?;
        let cell_b = self
            .cell(id_b)
            .ok_or_else(|| StoreError::NotFound(id_b.clone()))?;
        let now = self.clock.now();

        // Deterministic global order: the lower identity locks first.
        let a_first = id_a < id_b;
        let (first, second) = if a_first {
            (&cell_a, &cell_b)
        } else {
            (&cell_b, &cell_a)
        };
        let mut guard_first = first.lock();
        let mut guard_second = second.lock();
        let (guard_a, guard_b) = if a_first {
            (&mut *guard_first, &mut *guard_second)
        } else {
            (&mut *guard_second, &mut *guard_first)
        };

        let mut base_a = guard_a.clone();
        let mut base_b = guard_b.clone();
        let expired = base_a.expire_shield(now) | base_b.expire_shield(now);

        let mut work_a = base_a.clone();
        let mut work_b = base_b.clone();
        match transform(&mut work_a, &mut work_b, now) {
            Ok(value) => {
                self.journal.append_pair(&work_a, &work_b)?;
                *guard_a = work_a.clone();
                *guard_b = work_b.clone();
                Ok((work_a, work_b, value))
            }
            Err(err) => {
                if expired {
                    self.journal.append_pair(&base_a, &base_b)?;
                    *guard_a = base_a;
                    *guard_b = base_b;
                }
                Err(StoreError::Rejected(err))
            }
        }
    }

    /// Snapshots every aggregate, clearing lapsed shields as it goes.
    ///
    /// # Errors
    ///
    /// Fails when persisting a shield clear fails.
    pub fn players(&self) -> StoreResult<Vec<Player>> {
        let cells: Vec<_> = self.players.read().values().cloned().collect();
        let mut roster = Vec::with_capacity(cells.len());
        for cell in &cells {
            roster.push(self.refreshed(cell)?);
        }
        Ok(roster)
    }

    /// Number of known players.
    #[must_use]
    pub fn len(&self) -> usize {
        self.players.read().len()
    }

    /// Whether the store has no players.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.players.read().is_empty()
    }

    /// Compacts the journal down to one record per player.
    ///
    /// Every append path is excluded for the duration: the directory write
    /// lock blocks new-player registration, and taking every cell lock (in
    /// identity order, the same global order pair commits use) drains
    /// in-flight commits. Without that exclusion a commit landing between
    /// the roster capture and the rewrite would be truncated away while a
    /// stale snapshot lands later in file order.
    ///
    /// # Errors
    ///
    /// Fails on journal I/O errors.
    pub fn checkpoint(&self) -> StoreResult<()> {
        let players = self.players.write();
        let mut entries: Vec<_> = players
            .iter()
            .map(|(id, cell)| (id.clone(), cell.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let guards: Vec<_> = entries.iter().map(|(_, cell)| cell.lock()).collect();
        let roster: Vec<Player> = guards.iter().map(|guard| (**guard).clone()).collect();
        self.journal.checkpoint(&roster)?;
        Ok(())
    }

    fn cell(&self, id: &PlayerId) -> Option<Arc<Mutex<Player>>> {
        self.players.read().get(id).cloned()
    }

    /// Snapshot with lazy shield expiry applied and persisted.
    fn refreshed(&self, cell: &Arc<Mutex<Player>>) -> StoreResult<Player> {
        let now = self.clock.now();
        let mut guard = cell.lock();
        if guard.expire_shield(now) {
            self.journal.append_one(&guard)?;
        }
        Ok(guard.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use molewar_engine::{EconomyError, ManualClock};
    use std::path::PathBuf;

    fn temp_store_path() -> PathBuf {
        let id = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("molewar_store_{id}.mwjl"))
    }

    fn profile(id: &str) -> NewPlayer {
        NewPlayer {
            id: PlayerId::new(id),
            display_name: format!("mole-{id}"),
            avatar_url: None,
        }
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let path = temp_store_path();
        let clock = Arc::new(ManualClock::starting_at(Timestamp::from_millis(1_000)));
        let store = PlayerStore::open(&path, clock).unwrap();

        let created = store.get_or_create(profile("1"), 1000).unwrap();
        assert_eq!(created.points, 1000);

        let mut richer = profile("1");
        richer.display_name = "someone-else".to_string();
        let again = store.get_or_create(richer, 9999).unwrap();
        assert_eq!(again.points, 1000);
        assert_eq!(again.display_name, "mole-1");
        assert_eq!(store.len(), 1);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_commit_persists_across_reopen() {
        let path = temp_store_path();
        {
            let clock = Arc::new(ManualClock::starting_at(Timestamp::from_millis(1_000)));
            let store = PlayerStore::open(&path, clock).unwrap();
            store.get_or_create(profile("1"), 1000).unwrap();
            let (after, gained) = store
                .commit(&PlayerId::new("1"), |player, _now| {
                    player.points += 100;
                    Ok(100u64)
                })
                .unwrap();
            assert_eq!(after.points, 1100);
            assert_eq!(gained, 100);
        }
        {
            let clock = Arc::new(ManualClock::starting_at(Timestamp::from_millis(2_000)));
            let store = PlayerStore::open(&path, clock).unwrap();
            assert_eq!(store.get(&PlayerId::new("1")).unwrap().points, 1100);
        }
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_rejected_commit_leaves_state_unchanged() {
        let path = temp_store_path();
        let clock = Arc::new(ManualClock::starting_at(Timestamp::from_millis(1_000)));
        let store = PlayerStore::open(&path, clock).unwrap();
        store.get_or_create(profile("1"), 1000).unwrap();

        let err = store
            .commit(&PlayerId::new("1"), |player, _now| {
                player.points += 500;
                Err::<(), _>(EconomyError::AlreadyAlive)
            })
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Rejected(EconomyError::AlreadyAlive)
        ));
        assert_eq!(store.get(&PlayerId::new("1")).unwrap().points, 1000);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_unknown_player_is_not_found() {
        let path = temp_store_path();
        let clock = Arc::new(ManualClock::starting_at(Timestamp::from_millis(1_000)));
        let store = PlayerStore::open(&path, clock).unwrap();
        assert!(matches!(
            store.get(&PlayerId::new("ghost")),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.commit(&PlayerId::new("ghost"), |_, _| Ok(())),
            Err(StoreError::NotFound(_))
        ));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_aliased_pair_is_rejected() {
        let path = temp_store_path();
        let clock = Arc::new(ManualClock::starting_at(Timestamp::from_millis(1_000)));
        let store = PlayerStore::open(&path, clock).unwrap();
        store.get_or_create(profile("1"), 1000).unwrap();
        assert!(matches!(
            store.commit_pair(&PlayerId::new("1"), &PlayerId::new("1"), |_, _, _| Ok(())),
            Err(StoreError::AliasedPair)
        ));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_lapsed_shield_clears_on_read_and_persists() {
        let path = temp_store_path();
        let clock = Arc::new(ManualClock::starting_at(Timestamp::from_millis(1_000)));
        {
            let store = PlayerStore::open(&path, clock.clone()).unwrap();
            store.get_or_create(profile("1"), 2000).unwrap();
            store
                .commit(&PlayerId::new("1"), |player, now| {
                    player.shield_expires_at = Some(now.plus_millis(10_000));
                    Ok(())
                })
                .unwrap();

            clock.advance_millis(10_000);
            let read = store.get(&PlayerId::new("1")).unwrap();
            assert!(read.shield_expires_at.is_none());
        }
        {
            // The clear survived the journal append-and-replay.
            let store = PlayerStore::open(&path, clock).unwrap();
            let read = store.get(&PlayerId::new("1")).unwrap();
            assert!(read.shield_expires_at.is_none());
        }
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_pair_commit_moves_points_atomically() {
        let path = temp_store_path();
        let clock = Arc::new(ManualClock::starting_at(Timestamp::from_millis(1_000)));
        let store = PlayerStore::open(&path, clock).unwrap();
        store.get_or_create(profile("1"), 1000).unwrap();
        store.get_or_create(profile("2"), 1000).unwrap();

        let (a, b, moved) = store
            .commit_pair(&PlayerId::new("1"), &PlayerId::new("2"), |a, b, _now| {
                let moved = b.points.min(100);
                b.points -= moved;
                a.points += moved;
                Ok(moved)
            })
            .unwrap();
        assert_eq!(moved, 100);
        assert_eq!(a.points, 1100);
        assert_eq!(b.points, 900);
        assert_eq!(a.points + b.points, 2000);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_crossing_pair_commits_do_not_deadlock() {
        let path = temp_store_path();
        let clock = Arc::new(ManualClock::starting_at(Timestamp::from_millis(1_000)));
        let store = Arc::new(PlayerStore::open(&path, clock).unwrap());
        store.get_or_create(profile("1"), 10_000).unwrap();
        store.get_or_create(profile("2"), 10_000).unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            let (attacker, target) = if i % 2 == 0 { ("1", "2") } else { ("2", "1") };
            handles.push(std::thread::spawn(move || {
                for _ in 0..50 {
                    store
                        .commit_pair(
                            &PlayerId::new(attacker),
                            &PlayerId::new(target),
                            |a, b, _now| {
                                let moved = b.points.min(10);
                                b.points -= moved;
                                a.points += moved;
                                Ok(moved)
                            },
                        )
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let total: u64 = store.players().unwrap().iter().map(|p| p.points).sum();
        assert_eq!(total, 20_000);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_checkpoint_racing_commits_loses_nothing() {
        let path = temp_store_path();
        let clock = Arc::new(ManualClock::starting_at(Timestamp::from_millis(1_000)));
        {
            let store = Arc::new(PlayerStore::open(&path, clock.clone()).unwrap());
            store.get_or_create(profile("1"), 1000).unwrap();

            // One thread increments, another compacts, continuously. Any
            // commit that lands must survive the concurrent rewrite.
            let committer = {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..300 {
                        store
                            .commit(&PlayerId::new("1"), |player, _now| {
                                player.points += 1;
                                Ok(())
                            })
                            .unwrap();
                    }
                })
            };
            for _ in 0..50 {
                store.checkpoint().unwrap();
            }
            committer.join().unwrap();
            store.checkpoint().unwrap();
            assert_eq!(store.get(&PlayerId::new("1")).unwrap().points, 1300);
        }
        {
            let store = PlayerStore::open(&path, clock).unwrap();
            assert_eq!(store.get(&PlayerId::new("1")).unwrap().points, 1300);
        }
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_checkpoint_preserves_state() {
        let path = temp_store_path();
        let clock = Arc::new(ManualClock::starting_at(Timestamp::from_millis(1_000)));
        {
            let store = PlayerStore::open(&path, clock.clone()).unwrap();
            store.get_or_create(profile("1"), 1000).unwrap();
            for _ in 0..20 {
                store
                    .commit(&PlayerId::new("1"), |player, _now| {
                        player.points += 1;
                        Ok(())
                    })
                    .unwrap();
            }
            store.checkpoint().unwrap();
        }
        {
            let store = PlayerStore::open(&path, clock).unwrap();
            assert_eq!(store.get(&PlayerId::new("1")).unwrap().points, 1020);
        }
        std::fs::remove_file(&path).ok();
    }
}

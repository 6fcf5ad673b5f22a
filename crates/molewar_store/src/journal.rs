//! # Player Journal
//!
//! Append-only, crash-consistent record of player snapshots.
//!
//! Every store commit appends one fsynced record holding the full
//! post-commit snapshot of the player(s) it touched; replay applies
//! records in order and the last snapshot per identity wins. A torn or
//! bit-rotted tail (crash mid-append) is detected by the per-record CRC
//! and ignored, which is exactly the pre-commit state.
//!
//! ## Format
//!
//! ```text
//! [4 bytes: magic "MWJL"]
//! [4 bytes: format version]
//!
//! Record:
//! [8 bytes: sequence number]
//! [1 byte: kind (1 = one snapshot, 2 = snapshot pair)]
//! [4 bytes: payload length]
//! [N bytes: payload (serialized snapshots)]
//! [4 bytes: CRC32 of all of the above]
//! ```

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use molewar_engine::{NewPlayer, Player, PlayerId, Timestamp};
use parking_lot::Mutex;

use crate::error::JournalError;

/// Magic bytes identifying a journal file.
const JOURNAL_MAGIC: &[u8; 4] = b"MWJL";

/// Current journal format version.
const JOURNAL_VERSION: u32 = 1;

/// Record kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
enum RecordKind {
    /// One player snapshot.
    Single = 1,
    /// Two player snapshots committed as one atomic unit.
    Pair = 2,
}

impl RecordKind {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Single),
            2 => Some(Self::Pair),
            _ => None,
        }
    }

    const fn snapshot_count(self) -> usize {
        match self {
            Self::Single => 1,
            Self::Pair => 2,
        }
    }
}

/// Append-only journal of player snapshots.
pub struct Journal {
    path: PathBuf,
    file: Mutex<BufWriter<File>>,
    next_seq: AtomicU64,
}

impl Journal {
    /// Opens (or creates) a journal and replays it into a player map.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors or an unreadable header. A damaged record
    /// *tail* is not an error: replay stops there with a warning.
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, HashMap<PlayerId, Player>), JournalError> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        let journal = Self {
            path: path.clone(),
            file: Mutex::new(BufWriter::new(file)),
            next_seq: AtomicU64::new(0),
        };

        {
            let mut file = journal.file.lock();
            if file.get_ref().metadata()?.len() == 0 {
                file.write_all(JOURNAL_MAGIC)?;
                file.write_all(&JOURNAL_VERSION.to_le_bytes())?;
                file.flush()?;
            }
        }

        let players = journal.replay()?;
        Ok((journal, players))
    }

    /// Appends and fsyncs one snapshot.
    pub fn append_one(&self, player: &Player) -> Result<u64, JournalError> {
        let mut payload = Vec::with_capacity(128);
        encode_player(&mut payload, player)?;
        self.append_record(RecordKind::Single, &payload)
    }

    /// Appends and fsyncs a snapshot pair as one atomic unit.
    pub fn append_pair(&self, a: &Player, b: &Player) -> Result<u64, JournalError> {
        let mut payload = Vec::with_capacity(256);
        encode_player(&mut payload, a)?;
        encode_player(&mut payload, b)?;
        self.append_record(RecordKind::Pair, &payload)
    }

    fn append_record(&self, kind: RecordKind, payload: &[u8]) -> Result<u64, JournalError> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);

        let mut record = Vec::with_capacity(8 + 1 + 4 + payload.len() + 4);
        record.extend_from_slice(&seq.to_le_bytes());
        record.push(kind as u8);
        record.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        record.extend_from_slice(payload);
        let crc = crc32fast::hash(&record);
        record.extend_from_slice(&crc.to_le_bytes());

        let mut file = self.file.lock();
        file.write_all(&record)?;
        file.flush()?;
        // Durability: the commit is not acknowledged until it is on disk.
        file.get_ref().sync_all()?;
        Ok(seq)
    }

    /// Rewrites the journal as one snapshot per live player.
    ///
    /// Call after the caller has quiesced commits; shrinks an append-only
    /// file that otherwise grows forever.
    pub fn checkpoint(&self, players: &[Player]) -> Result<(), JournalError> {
        let mut file = self.file.lock();
        file.flush()?;

        let raw = file.get_mut();
        raw.seek(SeekFrom::Start(0))?;
        raw.set_len(0)?;
        raw.write_all(JOURNAL_MAGIC)?;
        raw.write_all(&JOURNAL_VERSION.to_le_bytes())?;
        drop(file);

        for player in players {
            self.append_one(player)?;
        }
        tracing::debug!(players = players.len(), "journal checkpoint complete");
        Ok(())
    }

    /// Replays the journal from the start; last snapshot per identity wins.
    fn replay(&self) -> Result<HashMap<PlayerId, Player>, JournalError> {
        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != JOURNAL_MAGIC {
            return Err(JournalError::BadMagic);
        }
        let mut version_bytes = [0u8; 4];
        reader.read_exact(&mut version_bytes)?;
        let version = u32::from_le_bytes(version_bytes);
        if version != JOURNAL_VERSION {
            return Err(JournalError::UnsupportedVersion(version));
        }

        let mut players = HashMap::new();
        let mut max_seq: Option<u64> = None;
        let mut records = 0u64;

        loop {
            let (seq, snapshots) = match read_record(&mut reader) {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(err) => {
                    // A torn tail means the last append never committed;
                    // everything before it is intact.
                    tracing::warn!(%err, records, "journal tail unreadable, truncating replay");
                    break;
                }
            };
            max_seq = Some(max_seq.map_or(seq, |m| m.max(seq)));
            records += 1;
            for snapshot in snapshots {
                players.insert(snapshot.id.clone(), snapshot);
            }
        }

        self.next_seq
            .store(max_seq.map_or(0, |m| m + 1), Ordering::SeqCst);
        if records > 0 {
            tracing::info!(records, players = players.len(), "journal replayed");
        }
        Ok(players)
    }
}

/// Reads one record; `Ok(None)` at a clean end of file.
fn read_record(reader: &mut BufReader<File>) -> Result<Option<(u64, Vec<Player>)>, JournalError> {
    let mut seq_bytes = [0u8; 8];
    match reader.read_exact(&mut seq_bytes) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let mut kind_byte = [0u8; 1];
    reader.read_exact(&mut kind_byte)?;
    let kind = RecordKind::from_u8(kind_byte[0])
        .ok_or_else(|| JournalError::Corrupt(format!("unknown record kind {}", kind_byte[0])))?;

    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let payload_len = u32::from_le_bytes(len_bytes) as usize;

    let mut payload = vec![0u8; payload_len];
    reader.read_exact(&mut payload)?;

    let mut crc_bytes = [0u8; 4];
    reader.read_exact(&mut crc_bytes)?;
    let stored_crc = u32::from_le_bytes(crc_bytes);

    let mut crc_data = Vec::with_capacity(8 + 1 + 4 + payload_len);
    crc_data.extend_from_slice(&seq_bytes);
    crc_data.push(kind_byte[0]);
    crc_data.extend_from_slice(&len_bytes);
    crc_data.extend_from_slice(&payload);
    if crc32fast::hash(&crc_data) != stored_crc {
        return Err(JournalError::Corrupt("crc mismatch".to_string()));
    }

    let mut cursor = Cursor::new(&payload);
    let mut snapshots = Vec::with_capacity(kind.snapshot_count());
    for _ in 0..kind.snapshot_count() {
        snapshots.push(decode_player(&mut cursor)?);
    }
    if !cursor.at_end() {
        return Err(JournalError::Corrupt("trailing payload bytes".to_string()));
    }

    Ok(Some((u64::from_le_bytes(seq_bytes), snapshots)))
}

/// Serializes one snapshot, little-endian, length-prefixed strings.
fn encode_player(buf: &mut Vec<u8>, player: &Player) -> Result<(), JournalError> {
    write_str(buf, player.id.as_str())?;
    write_str(buf, &player.display_name)?;
    write_opt_str(buf, player.avatar_url.as_deref())?;
    buf.extend_from_slice(&player.points.to_le_bytes());
    buf.push(u8::from(player.alive));
    write_opt_ts(buf, player.died_at);
    write_opt_ts(buf, player.shield_expires_at);
    buf.extend_from_slice(&player.points_lost_in_window.to_le_bytes());
    write_opt_ts(buf, player.last_notified_at);
    buf.extend_from_slice(&player.created_at.as_millis().to_le_bytes());
    Ok(())
}

fn decode_player(cursor: &mut Cursor<'_>) -> Result<Player, JournalError> {
    let id = cursor.read_str()?;
    let display_name = cursor.read_str()?;
    let avatar_url = cursor.read_opt_str()?;
    let points = cursor.read_u64()?;
    let alive = cursor.read_u8()? != 0;
    let died_at = cursor.read_opt_ts()?;
    let shield_expires_at = cursor.read_opt_ts()?;
    let points_lost_in_window = cursor.read_u64()?;
    let last_notified_at = cursor.read_opt_ts()?;
    let created_at = Timestamp::from_millis(cursor.read_u64()?);

    let mut player = Player::create(
        NewPlayer {
            id: PlayerId::new(id),
            display_name,
            avatar_url,
        },
        points,
        created_at,
    );
    player.alive = alive;
    player.died_at = died_at;
    player.shield_expires_at = shield_expires_at;
    player.points_lost_in_window = points_lost_in_window;
    player.last_notified_at = last_notified_at;
    Ok(player)
}

fn write_str(buf: &mut Vec<u8>, value: &str) -> Result<(), JournalError> {
    // The length prefix is u16; a longer field cannot round-trip.
    let len = u16::try_from(value.len())
        .map_err(|_| JournalError::OversizedField(value.len()))?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(value.as_bytes());
    Ok(())
}

fn write_opt_str(buf: &mut Vec<u8>, value: Option<&str>) -> Result<(), JournalError> {
    match value {
        Some(value) => {
            buf.push(1);
            write_str(buf, value)?;
        }
        None => buf.push(0),
    }
    Ok(())
}

fn write_opt_ts(buf: &mut Vec<u8>, value: Option<Timestamp>) {
    match value {
        Some(ts) => {
            buf.push(1);
            buf.extend_from_slice(&ts.as_millis().to_le_bytes());
        }
        None => buf.push(0),
    }
}

/// Bounds-checked reader over a record payload.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos == self.data.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], JournalError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| JournalError::Corrupt("payload truncated".to_string()))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, JournalError> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16, JournalError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn read_u64(&mut self) -> Result<u64, JournalError> {
        let bytes: [u8; 8] = self
            .take(8)?
            .try_into()
            .map_err(|_| JournalError::Corrupt("bad u64".to_string()))?;
        Ok(u64::from_le_bytes(bytes))
    }

    fn read_str(&mut self) -> Result<String, JournalError> {
        let len = self.read_u16()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| JournalError::Corrupt("string is not utf-8".to_string()))
    }

    fn read_opt_str(&mut self) -> Result<Option<String>, JournalError> {
        match self.read_u8()? {
            0 => Ok(None),
            1 => Ok(Some(self.read_str()?)),
            tag => Err(JournalError::Corrupt(format!("bad option tag {tag}"))),
        }
    }

    fn read_opt_ts(&mut self) -> Result<Option<Timestamp>, JournalError> {
        match self.read_u8()? {
            0 => Ok(None),
            1 => Ok(Some(Timestamp::from_millis(self.read_u64()?))),
            tag => Err(JournalError::Corrupt(format!("bad option tag {tag}"))),
        }
    }
}

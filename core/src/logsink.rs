/*
 * SPDX-FileCopyrightText: 2025 Drydock Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use chrono::Utc;
use entity::build_log::{LogLevel, LogOrigin};
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::types::*;

/// Append-only log writer for one build. Sequence numbers are assigned under
/// an internal lock, so lines from concurrent producers (a subprocess stdout
/// and stderr drained at the same time) stay monotonic and gap-free.
#[derive(Debug)]
pub struct LogSink {
    db: DatabaseConnection,
    build_id: Uuid,
    next_seq: Mutex<i64>,
}

impl LogSink {
    pub async fn for_build(db: &DatabaseConnection, build_id: Uuid) -> Result<Arc<Self>, DbErr> {
        // resume numbering after the highest persisted line
        let last = EBuildLog::find()
            .filter(CBuildLog::Build.eq(build_id))
            .order_by_desc(CBuildLog::Seq)
            .one(db)
            .await?;

        Ok(Arc::new(LogSink {
            db: db.clone(),
            build_id,
            next_seq: Mutex::new(last.map(|line| line.seq + 1).unwrap_or(0)),
        }))
    }

    pub fn build_id(&self) -> Uuid {
        self.build_id
    }

    pub async fn append(
        &self,
        level: LogLevel,
        origin: LogOrigin,
        message: &str,
    ) -> Result<MBuildLog, DbErr> {
        let mut seq = self.next_seq.lock().await;

        let line = ABuildLog {
            id: Set(Uuid::new_v4()),
            build: Set(self.build_id),
            seq: Set(*seq),
            level: Set(level),
            origin: Set(origin),
            message: Set(message.to_string()),
            created_at: Set(Utc::now().naive_utc()),
        };

        // insert while holding the lock so a later seq is never visible
        // before an earlier one
        let line = line.insert(&self.db).await?;
        *seq += 1;

        Ok(line)
    }

    pub fn writer(self: &Arc<Self>, level: LogLevel, origin: LogOrigin) -> LogWriter {
        LogWriter {
            sink: Arc::clone(self),
            level,
            origin,
            buffer: String::new(),
        }
    }
}

/// Line-buffering byte writer on top of a [`LogSink`]. Each producer gets its
/// own writer; only whole lines are persisted until [`LogWriter::finish`]
/// flushes a trailing partial line.
pub struct LogWriter {
    sink: Arc<LogSink>,
    level: LogLevel,
    origin: LogOrigin,
    buffer: String,
}

impl LogWriter {
    pub async fn write(&mut self, chunk: &[u8]) -> Result<(), DbErr> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        // blank lines are lines too; dropping them would misrepresent the
        // subprocess output
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            self.sink.append(self.level, self.origin, line).await?;
        }

        Ok(())
    }

    pub async fn finish(mut self) -> Result<(), DbErr> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = rest.trim_end_matches('\r');
        if !rest.is_empty() {
            self.sink.append(self.level, self.origin, rest).await?;
        }
        Ok(())
    }
}

/// All persisted lines for a build, optionally only those after a sequence
/// cursor, ordered by sequence. The cursor form is what incremental tailing
/// uses to avoid re-sending history.
pub async fn list_logs(
    db: &DatabaseConnection,
    build_id: Uuid,
    after_seq: Option<i64>,
) -> Result<Vec<MBuildLog>, DbErr> {
    let mut query = EBuildLog::find().filter(CBuildLog::Build.eq(build_id));

    if let Some(after) = after_seq {
        query = query.filter(CBuildLog::Seq.gt(after));
    }

    query.order_by_asc(CBuildLog::Seq).all(db).await
}

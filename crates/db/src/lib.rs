#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod error;

use alloc::{collections::BTreeMap, vec::Vec};
use model::{GuildSettings, Poll, Settings, Tally, Vote};
use tokio_postgres::{
    error::SqlState,
    types::{Json, ToSql},
    Row,
};

pub use futures_util::{TryStream, TryStreamExt};
pub use tokio_postgres::{tls::NoTls, Client, Config};

type Param<'a> = &'a (dyn ToSql + Sync);

pub struct Database(Client);

impl From<Client> for Database {
    fn from(client: Client) -> Self {
        Self(client)
    }
}

/// Logs the driver error before collapsing it into the opaque fatal case.
fn fatal(err: tokio_postgres::Error) -> error::Error {
    log::error!("database query failed: {err}");
    error::Error::Fatal
}

fn deserialize_poll_from_row(row: &Row) -> Result<Poll, tokio_postgres::Error> {
    let id: i64 = row.try_get("id")?;
    let guild: i64 = row.try_get("guild")?;
    let channel: i64 = row.try_get("channel")?;
    let creator: i64 = row.try_get("creator")?;
    let Json(settings): Json<Settings> = row.try_get("settings")?;
    Ok(Poll {
        id: id as u64,
        guild: guild as u64,
        channel: channel as u64,
        creator: creator as u64,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        options: row.try_get("options")?,
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
        settings,
    })
}

fn deserialize_vote_from_row(poll: u64, row: &Row) -> Result<Vote, tokio_postgres::Error> {
    let user: i64 = row.try_get("voter")?;
    let option: i16 = row.try_get("choice")?;
    let weight: i32 = row.try_get("weight")?;
    Ok(Vote {
        poll,
        user: user as u64,
        option: option as u16,
        weight: weight as u32,
        created_at: row.try_get("created_at")?,
    })
}

impl Database {
    /// Persists a freshly posted poll. Its options are immutable from here on.
    pub async fn create_poll(&self, poll: &Poll) -> error::Result<()> {
        if poll.validate().is_err() {
            return Err(error::Error::BadInput);
        }

        let id = poll.id as i64;
        let guild = poll.guild as i64;
        let channel = poll.channel as i64;
        let creator = poll.creator as i64;
        let settings = Json(&poll.settings);
        let err = match self
            .0
            .execute(
                "INSERT INTO poll (id, guild, channel, creator, title, description, options, active, created_at, settings) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
                &[
                    &id,
                    &guild,
                    &channel,
                    &creator,
                    &poll.title,
                    &poll.description,
                    &poll.options,
                    &poll.active,
                    &poll.created_at,
                    &settings,
                ],
            )
            .await
        {
            Ok(_) => return Ok(()),
            Err(err) => err,
        };

        Err(match err.code().cloned() {
            Some(SqlState::UNIQUE_VIOLATION) => error::Error::AlreadyExists,
            Some(SqlState::CHECK_VIOLATION | SqlState::STRING_DATA_RIGHT_TRUNCATION) => error::Error::BadInput,
            _ => fatal(err),
        })
    }

    pub async fn get_poll(&self, poll: u64) -> error::Result<Poll> {
        let pid = poll as i64;
        let row = self
            .0
            .query_opt(
                "SELECT id, guild, channel, creator, title, description, options, active, created_at, settings \
                 FROM poll WHERE id = $1",
                &[&pid],
            )
            .await
            .map_err(fatal)?
            .ok_or(error::Error::NotFound)?;
        deserialize_poll_from_row(&row).map_err(fatal)
    }

    /// Opens or closes the poll.
    pub async fn set_active(&self, poll: u64, active: bool) -> error::Result<()> {
        let pid = poll as i64;
        match self.0.execute("UPDATE poll SET active = $2 WHERE id = $1", &[&pid, &active]).await {
            Ok(0) => Err(error::Error::NotFound),
            Ok(_) => Ok(()),
            Err(err) => Err(fatal(err)),
        }
    }

    /// Deletes the poll along with all of its votes. Used when the poll message is deleted.
    pub async fn delete_poll(&self, poll: u64) -> error::Result<()> {
        let pid = poll as i64;
        match self.0.execute("DELETE FROM poll WHERE id = $1", &[&pid]).await {
            Ok(0) => Err(error::Error::NotFound),
            Ok(_) => Ok(()),
            Err(err) => Err(fatal(err)),
        }
    }

    /// Deletes every poll and setting of a guild the bot has left. Returns the number of polls removed.
    pub async fn delete_guild(&self, guild: u64) -> error::Result<u64> {
        let gid = guild as i64;
        self.0
            .execute(
                "WITH weights AS (DELETE FROM guild_weight WHERE guild = $1), \
                 settings AS (DELETE FROM guild WHERE id = $1) \
                 DELETE FROM poll WHERE guild = $1",
                &[&gid],
            )
            .await
            .map_err(fatal)
    }

    /// Options currently selected by `user` on `poll`, in ascending order.
    pub async fn get_ballot(&self, poll: u64, user: u64) -> error::Result<Vec<u16>> {
        let pid = poll as i64;
        let uid = user as i64;
        self.0
            .query("SELECT choice FROM vote WHERE poll = $1 AND voter = $2 ORDER BY choice", &[&pid, &uid])
            .await
            .map_err(fatal)?
            .into_iter()
            .map(|row| row.try_get::<_, i16>("choice").map(|choice| choice as u16).map_err(fatal))
            .collect()
    }

    /// Atomically replaces the ballot of `user` on `poll` with `options`, each carrying `weight`.
    ///
    /// Rows for options no longer selected are deleted and rows for selected options are upserted
    /// in a single statement, so concurrent readers never observe a half-replaced ballot. Rows of
    /// other users are never touched.
    pub async fn replace_ballot(&self, poll: u64, user: u64, options: &[u16], weight: u32) -> error::Result<()> {
        let pid = poll as i64;
        let uid = user as i64;
        let choices: Vec<i16> = options.iter().map(|&option| option as i16).collect();
        let weight = i32::try_from(weight).map_err(|_| error::Error::BadInput)?;
        let err = match self
            .0
            .execute(
                "WITH removed AS (DELETE FROM vote WHERE poll = $1 AND voter = $2 AND NOT (choice = ANY($3))) \
                 INSERT INTO vote (poll, voter, choice, weight) \
                 SELECT $1::BIGINT, $2::BIGINT, choice, $4::INT FROM unnest($3::SMALLINT[]) AS choice \
                 ON CONFLICT (poll, voter, choice) DO UPDATE SET weight = EXCLUDED.weight, created_at = NOW()",
                &[&pid, &uid, &choices, &weight],
            )
            .await
        {
            Ok(_) => return Ok(()),
            Err(err) => err,
        };

        Err(match err.code().cloned() {
            // The poll row was deleted while its message stayed up.
            Some(SqlState::FOREIGN_KEY_VIOLATION) => error::Error::Orphaned,
            Some(SqlState::CHECK_VIOLATION) => error::Error::BadInput,
            _ => fatal(err),
        })
    }

    /// Recomputes the weighted tally of a poll with `options` options from its current votes.
    pub async fn get_tally(&self, poll: u64, options: usize) -> error::Result<Tally> {
        let pid = poll as i64;
        let rows = self.0.query("SELECT choice, weight FROM vote WHERE poll = $1", &[&pid]).await.map_err(fatal)?;
        let votes = rows
            .iter()
            .map(|row| -> Result<_, tokio_postgres::Error> {
                let choice: i16 = row.try_get("choice")?;
                let weight: i32 = row.try_get("weight")?;
                Ok((choice as u16, weight as u32))
            })
            .collect::<Result<Vec<_>, tokio_postgres::Error>>()
            .map_err(fatal)?;
        Ok(Tally::from_votes(options, votes))
    }

    /// Number of users who selected `option` on `poll`.
    pub async fn count_voters(&self, poll: u64, option: u16) -> error::Result<u64> {
        let pid = poll as i64;
        let choice = option as i16;
        let row = self
            .0
            .query_one("SELECT COUNT(*) AS voters FROM vote WHERE poll = $1 AND choice = $2", &[&pid, &choice])
            .await
            .map_err(fatal)?;
        let voters: i64 = row.try_get("voters").map_err(fatal)?;
        Ok(voters as u64)
    }

    /// One page of the users who selected `option`, oldest vote first.
    pub async fn get_voters_page(&self, poll: u64, option: u16, limit: u32, offset: u64) -> error::Result<Vec<u64>> {
        let pid = poll as i64;
        let choice = option as i16;
        let limit = i64::from(limit);
        let offset = i64::try_from(offset).map_err(|_| error::Error::BadInput)?;
        self.0
            .query(
                "SELECT voter FROM vote WHERE poll = $1 AND choice = $2 \
                 ORDER BY created_at, voter LIMIT $3 OFFSET $4",
                &[&pid, &choice, &limit, &offset],
            )
            .await
            .map_err(fatal)?
            .into_iter()
            .map(|row| row.try_get::<_, i64>("voter").map(|voter| voter as u64).map_err(fatal))
            .collect()
    }

    /// Every user who selected `option`, oldest vote first.
    pub async fn get_all_voters(&self, poll: u64, option: u16) -> error::Result<Vec<u64>> {
        let pid = poll as i64;
        let choice = option as i16;
        self.0
            .query(
                "SELECT voter FROM vote WHERE poll = $1 AND choice = $2 ORDER BY created_at, voter",
                &[&pid, &choice],
            )
            .await
            .map_err(fatal)?
            .into_iter()
            .map(|row| row.try_get::<_, i64>("voter").map(|voter| voter as u64).map_err(fatal))
            .collect()
    }

    /// Streams every vote row of a poll, oldest first.
    pub async fn get_votes(&self, poll: u64) -> error::Result<impl TryStream<Ok = Vote, Error = error::Error> + '_> {
        let pid = poll as i64;
        let params: [Param; 1] = [&pid];
        Ok(self
            .0
            .query_raw(
                "SELECT voter, choice, weight, created_at FROM vote WHERE poll = $1 ORDER BY created_at, voter, choice",
                params,
            )
            .await
            .map_err(fatal)?
            .map_err(fatal)
            .and_then(move |row| core::future::ready(deserialize_vote_from_row(poll, &row).map_err(fatal))))
    }

    /// Guild-wide settings. Guilds that never configured anything get the defaults.
    pub async fn get_guild_settings(&self, guild: u64) -> error::Result<GuildSettings> {
        let gid = guild as i64;
        let mut settings = match self
            .0
            .query_opt("SELECT show_buttons, manager_role FROM guild WHERE id = $1", &[&gid])
            .await
            .map_err(fatal)?
        {
            Some(row) => {
                let manager_role: Option<i64> = row.try_get("manager_role").map_err(fatal)?;
                GuildSettings {
                    weights: BTreeMap::new(),
                    show_buttons: row.try_get("show_buttons").map_err(fatal)?,
                    manager_role: manager_role.map(|role| role as u64),
                }
            }
            None => GuildSettings::default(),
        };

        for row in self
            .0
            .query("SELECT role, weight FROM guild_weight WHERE guild = $1", &[&gid])
            .await
            .map_err(fatal)?
        {
            let role: i64 = row.try_get("role").map_err(fatal)?;
            let weight: i32 = row.try_get("weight").map_err(fatal)?;
            settings.weights.insert(role as u64, weight as u32);
        }

        Ok(settings)
    }

    /// Overwrites the guild-wide settings, replacing the whole weight map.
    pub async fn set_guild_settings(&self, guild: u64, settings: &GuildSettings) -> error::Result<()> {
        let gid = guild as i64;
        let manager_role = settings.manager_role.map(|role| role as i64);
        let roles: Vec<i64> = settings.weights.keys().map(|&role| role as i64).collect();
        let weights = settings
            .weights
            .values()
            .map(|&weight| i32::try_from(weight))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| error::Error::BadInput)?;
        let err = match self
            .0
            .execute(
                "WITH settings AS ( \
                     INSERT INTO guild (id, show_buttons, manager_role) VALUES ($1, $2, $3) \
                     ON CONFLICT (id) DO UPDATE SET show_buttons = EXCLUDED.show_buttons, manager_role = EXCLUDED.manager_role \
                 ), removed AS (DELETE FROM guild_weight WHERE guild = $1 AND NOT (role = ANY($4))) \
                 INSERT INTO guild_weight (guild, role, weight) \
                 SELECT $1::BIGINT, role, weight FROM unnest($4::BIGINT[], $5::INT[]) AS w (role, weight) \
                 ON CONFLICT (guild, role) DO UPDATE SET weight = EXCLUDED.weight",
                &[&gid, &settings.show_buttons, &manager_role, &roles, &weights],
            )
            .await
        {
            Ok(_) => return Ok(()),
            Err(err) => err,
        };

        match err.code().cloned() {
            Some(SqlState::CHECK_VIOLATION) => Err(error::Error::BadInput),
            _ => Err(fatal(err)),
        }
    }
}

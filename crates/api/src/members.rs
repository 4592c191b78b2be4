//! Display data of guild members, roles, and channels, fetched on demand.

use alloc::{collections::BTreeMap, string::String, vec::Vec};
use futures_util::future::join_all;
use model::{
    export::Voter,
    mention::{self, Mention},
    page::PAGE_SIZE,
    Poll,
};
use serde::Deserialize;
use twilight_http::Client;
use twilight_model::id::{
    marker::{GuildMarker, UserMarker},
    Id,
};

/// Largest page of members the platform returns at once.
const MEMBER_PAGE: u16 = 1000;

#[derive(Deserialize)]
struct RawUser {
    id: Id<UserMarker>,
    username: String,
    #[serde(default)]
    global_name: Option<String>,
}

/// Subset of a guild member payload. Parsed by hand to pick up the global display name.
#[derive(Deserialize)]
struct RawMember {
    #[serde(default)]
    nick: Option<String>,
    user: RawUser,
}

impl From<RawMember> for Voter {
    fn from(RawMember { nick, user }: RawMember) -> Self {
        let RawUser { id, username, global_name } = user;
        let display_name = global_name.unwrap_or_else(|| username.clone());
        Self { id: id.get(), username, display_name, nickname: nick }
    }
}

async fn member(client: &Client, guild: Id<GuildMarker>, user: u64) -> Option<Voter> {
    let user = Id::new_checked(user)?;
    let response = match client.guild_member(guild, user).await {
        Ok(response) => response,
        Err(err) => {
            log::warn!("failed to fetch member {user} of guild {guild}: {err}");
            return None;
        }
    };

    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(err) => {
            log::error!("failed to read member {user} of guild {guild}: {err}");
            return None;
        }
    };

    match serde_json::from_slice::<RawMember>(&bytes) {
        Ok(member) => Some(member.into()),
        Err(err) => {
            log::error!("unexpected member payload for {user}: {err}");
            None
        }
    }
}

/// Walks the guild member list until every wanted member has been seen.
async fn scan_members(client: &Client, guild: Id<GuildMarker>, wanted: &mut BTreeMap<u64, Option<Voter>>) {
    let mut remaining = wanted.len();
    let mut after = None;
    while remaining > 0 {
        let mut request = match client.guild_members(guild).limit(MEMBER_PAGE) {
            Ok(request) => request,
            Err(err) => {
                log::error!("invalid member list request: {err}");
                return;
            }
        };
        if let Some(after) = after {
            request = request.after(after);
        }

        let response = match request.await {
            Ok(response) => response,
            Err(err) => {
                log::error!("failed to list members of guild {guild}: {err}");
                return;
            }
        };
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => {
                log::error!("failed to read members of guild {guild}: {err}");
                return;
            }
        };
        let members: Vec<RawMember> = match serde_json::from_slice(&bytes) {
            Ok(members) => members,
            Err(err) => {
                log::error!("unexpected member list payload for guild {guild}: {err}");
                return;
            }
        };

        let count = members.len();
        after = members.last().map(|member| member.user.id);
        for member in members {
            if let Some(slot) = wanted.get_mut(&member.user.id.get()) {
                if slot.is_none() {
                    *slot = Some(member.into());
                    remaining -= 1;
                }
            }
        }

        if count < usize::from(MEMBER_PAGE) {
            break;
        }
    }
}

/// Display data for each of `ids`, in order. Members that cannot be found become placeholders.
///
/// A page-sized request looks members up one by one. Larger requests walk the member list in bulk.
pub async fn voters(client: &Client, guild: Id<GuildMarker>, ids: &[u64]) -> Vec<Voter> {
    if ids.len() <= PAGE_SIZE as usize {
        let found = join_all(ids.iter().map(|&id| member(client, guild, id))).await;
        return ids.iter().zip(found).map(|(&id, voter)| voter.unwrap_or_else(|| Voter::unknown(id))).collect();
    }

    let mut wanted: BTreeMap<_, _> = ids.iter().map(|&id| (id, None)).collect();
    scan_members(client, guild, &mut wanted).await;
    ids.iter().map(|&id| wanted.get(&id).cloned().flatten().unwrap_or_else(|| Voter::unknown(id))).collect()
}

/// Name shown for a single member.
pub async fn display_name(client: &Client, guild: u64, user: u64) -> String {
    let Some(guild) = Id::new_checked(guild) else {
        return Voter::unknown(user).display_name;
    };
    let voter = member(client, guild, user).await.unwrap_or_else(|| Voter::unknown(user));
    String::from(voter.shown_name())
}

/// Option labels with every mention replaced by a display name.
pub async fn labels(client: &Client, poll: &Poll) -> Vec<String> {
    let mentions: Vec<_> = poll.options.iter().flat_map(|label| mention::scan(label)).collect();
    let Some(guild) = Id::<GuildMarker>::new_checked(poll.guild).filter(|_| !mentions.is_empty()) else {
        return poll.options.clone();
    };

    let cached = &poll.settings.role_metadata;
    let mut names = BTreeMap::new();
    for (&role, meta) in cached {
        names.insert((1u8, role), meta.name.clone());
    }

    let needs_roles =
        mentions.iter().any(|mention| matches!(mention, Mention::Role(role) if !cached.contains_key(role)));
    if needs_roles {
        match client.roles(guild).await {
            Ok(response) => match response.models().await {
                Ok(roles) => names.extend(roles.into_iter().map(|role| ((1, role.id.get()), role.name))),
                Err(err) => log::error!("failed to read roles of guild {guild}: {err}"),
            },
            Err(err) => log::warn!("failed to fetch roles of guild {guild}: {err}"),
        }
    }

    if mentions.iter().any(|mention| matches!(mention, Mention::Channel(_))) {
        match client.guild_channels(guild).await {
            Ok(response) => match response.models().await {
                Ok(channels) => names.extend(
                    channels.into_iter().filter_map(|channel| Some(((2, channel.id.get()), channel.name?))),
                ),
                Err(err) => log::error!("failed to read channels of guild {guild}: {err}"),
            },
            Err(err) => log::warn!("failed to fetch channels of guild {guild}: {err}"),
        }
    }

    let mut users: Vec<_> =
        mentions.iter().filter_map(|mention| if let Mention::User(user) = *mention { Some(user) } else { None }).collect();
    users.sort_unstable();
    users.dedup();
    let found = join_all(users.iter().map(|&user| member(client, guild, user))).await;
    for (user, voter) in users.into_iter().zip(found) {
        if let Some(voter) = voter {
            names.insert((0, user), String::from(voter.shown_name()));
        }
    }

    poll.options
        .iter()
        .map(|label| {
            mention::resolve(label, |mention| {
                let key = match mention {
                    Mention::User(id) => (0, id),
                    Mention::Role(id) => (1, id),
                    Mention::Channel(id) => (2, id),
                };
                names.get(&key).cloned()
            })
        })
        .collect()
}

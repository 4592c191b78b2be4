#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod components;
pub mod error;
mod lifecycle;
mod members;
mod refresh;
pub mod render;
mod view;
mod vote;

use alloc::{
    string::{String, ToString},
    sync::Arc,
    vec::Vec,
};
use core::{fmt::Display, num::NonZeroU64};
use db::Database;
use ed25519_dalek::{Signature, Verifier};
use error::Error;
use http_body_util::{BodyExt, Full};
use hyper::{
    body::{Body, Bytes},
    header::{HeaderValue, CONTENT_TYPE},
    Method, Request, Response, StatusCode,
};
use model::{
    token::{Action, CustomId},
    GuildSettings, Poll,
};
use refresh::Refreshes;
use render::Renderer;
use twilight_model::{
    application::interaction::{
        message_component::MessageComponentInteractionData, Interaction, InteractionData, InteractionType,
    },
    channel::message::{Component, Embed, MessageFlags},
    guild::Permissions,
    http::{
        attachment::Attachment,
        interaction::{InteractionResponse, InteractionResponseData, InteractionResponseType},
    },
    id::{marker::ApplicationMarker, Id},
};

pub use ed25519_dalek::VerifyingKey as PublicKey;

/// Converts a stored snowflake back into a typed ID.
fn id<T>(raw: u64) -> error::Result<Id<T>> {
    Id::new_checked(raw).ok_or(Error::Schema)
}

/// Logs an outgoing message that failed local validation.
fn invalid<E: Display>(err: E) -> Error {
    log::error!("rejected outgoing message: {err}");
    Error::Schema
}

/// The message that carried the clicked component.
struct Source {
    channel: u64,
    message: u64,
    components: Vec<Component>,
}

/// Everything a detached handler needs to know about the interaction.
struct Context {
    token: String,
    user: u64,
    roles: Vec<u64>,
    permissions: Permissions,
    /// Permissions of the bot itself in the channel.
    app_permissions: Option<Permissions>,
    locale: String,
    values: Vec<String>,
    source: Option<Source>,
}

impl Context {
    /// Holders of the guild-management permission or the designated manager role.
    fn is_manager(&self, guild: &GuildSettings) -> bool {
        self.permissions.contains(Permissions::MANAGE_GUILD)
            || guild.manager_role.is_some_and(|role| self.roles.contains(&role))
    }

    fn may_browse(&self, poll: &Poll, guild: &GuildSettings) -> bool {
        self.user == poll.creator || self.is_manager(guild)
    }
}

/// Final edit of a deferred response.
#[derive(Default)]
struct Reply {
    content: Option<String>,
    embeds: Vec<Embed>,
    components: Option<Vec<Component>>,
    attachments: Vec<Attachment>,
}

impl Reply {
    fn text(content: impl Into<String>) -> Self {
        Self { content: Some(content.into()), ..Default::default() }
    }
}

struct Inner {
    db: Database,
    client: twilight_http::Client,
    app: Id<ApplicationMarker>,
    renderer: Renderer,
    refreshes: Refreshes,
}

pub struct Bot {
    inner: Arc<Inner>,
    public: PublicKey,
}

impl Bot {
    pub fn new(db: Database, app: NonZeroU64, token: String, public: PublicKey, renderer: Renderer) -> Self {
        let inner = Inner {
            db,
            client: twilight_http::Client::new(token),
            app: Id::from(app),
            renderer,
            refreshes: Refreshes::default(),
        };
        Self { inner: Arc::new(inner), public }
    }

    /// Verifies, parses, and answers one request to the interaction endpoint.
    pub async fn try_respond<B: Body>(&self, req: Request<B>) -> Result<Response<Full<Bytes>>, StatusCode> {
        if req.uri().path() != "/" {
            return Err(StatusCode::NOT_FOUND);
        }
        if req.method() != Method::POST {
            return Err(StatusCode::METHOD_NOT_ALLOWED);
        }

        // Retrieve security headers
        let headers = req.headers();
        let sig = headers.get("X-Signature-Ed25519").ok_or(StatusCode::BAD_REQUEST)?;
        let timestamp = headers.get("X-Signature-Timestamp").ok_or(StatusCode::BAD_REQUEST)?;
        let mut signature = [0; Signature::BYTE_SIZE];
        hex::decode_to_slice(sig.as_bytes(), &mut signature).map_err(|_| StatusCode::BAD_REQUEST)?;
        let signature = Signature::from_bytes(&signature);
        let mut message = timestamp.as_bytes().to_vec();

        // Append body after the timestamp
        let payload = req.into_body().collect().await.map_err(|_| StatusCode::BAD_REQUEST)?.to_bytes();
        message.extend_from_slice(&payload);

        // Validate the challenge
        self.public.verify(&message, &signature).map_err(|_| {
            log::warn!("rejected interaction with an invalid signature");
            StatusCode::UNAUTHORIZED
        })?;
        drop(message);

        // Parse incoming interaction
        let interaction = serde_json::from_slice(&payload).map_err(|err| {
            log::warn!("rejected malformed interaction: {err}");
            StatusCode::BAD_REQUEST
        })?;
        drop(payload);

        let reply = self.on_interaction(interaction);
        let bytes = serde_json::to_vec(&reply).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        let mut res = Response::new(Full::new(Bytes::from(bytes)));
        res.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(res)
    }

    pub fn on_interaction(&self, interaction: Interaction) -> InteractionResponse {
        let result = match interaction.kind {
            InteractionType::Ping => Ok(InteractionResponse { kind: InteractionResponseType::Pong, data: None }),
            InteractionType::MessageComponent => self.on_msg_component(interaction),
            _ => Err(Error::UnsupportedInteraction),
        };

        let text = match result {
            Ok(res) => return res,
            Err(err) => err.to_string(),
        };

        InteractionResponse {
            kind: InteractionResponseType::ChannelMessageWithSource,
            data: Some(InteractionResponseData {
                content: Some(text),
                flags: Some(MessageFlags::EPHEMERAL),
                ..Default::default()
            }),
        }
    }

    /// Defers the response and finishes the work in a detached task.
    fn on_msg_component(&self, interaction: Interaction) -> error::Result<InteractionResponse> {
        let Interaction { app_permissions, data, guild_locale, locale, member, message, token, .. } = interaction;
        let member = member.ok_or(Error::UnknownUser)?;
        let user = member.user.as_ref().ok_or(Error::UnknownUser)?.id.get();

        let Some(InteractionData::MessageComponent(data)) = data else {
            return Err(Error::Schema);
        };
        let MessageComponentInteractionData { custom_id, values, .. } = data;
        let id: CustomId = custom_id.parse().map_err(|err| {
            log::warn!("unknown custom ID {custom_id:?}: {err}");
            Error::Schema
        })?;

        let source = message.map(|message| Source {
            channel: message.channel_id.get(),
            message: message.id.get(),
            components: message.components,
        });

        // Browser navigation edits the browser itself. Everything else answers with a new ephemeral message.
        let in_place = match id {
            CustomId::View(token) => {
                token.action != Action::Export && source.as_ref().is_some_and(|source| source.message != token.poll)
            }
            _ => false,
        };

        let ctx = Context {
            token,
            user,
            roles: member.roles.iter().map(|role| role.get()).collect(),
            permissions: member.permissions.unwrap_or_else(Permissions::empty),
            app_permissions,
            locale: guild_locale.or(locale).unwrap_or_else(|| String::from("en-US")),
            values,
            source,
        };

        let inner = self.inner.clone();
        tokio::spawn(async move { inner.complete(id, ctx).await });

        Ok(if in_place {
            InteractionResponse { kind: InteractionResponseType::DeferredUpdateMessage, data: None }
        } else {
            InteractionResponse {
                kind: InteractionResponseType::DeferredChannelMessageWithSource,
                data: Some(InteractionResponseData { flags: Some(MessageFlags::EPHEMERAL), ..Default::default() }),
            }
        })
    }
}

impl Inner {
    async fn complete(&self, id: CustomId, ctx: Context) {
        let result = match id {
            CustomId::Vote(poll) => self.on_vote(poll, &ctx).await,
            CustomId::Close(poll) => self.on_lifecycle(poll, false, &ctx).await,
            CustomId::Reopen(poll) => self.on_lifecycle(poll, true, &ctx).await,
            CustomId::Results(poll) => self.on_results(poll, &ctx).await,
            CustomId::Csv(poll) => self.on_csv(poll, &ctx).await,
            CustomId::View(token) => self.on_view(token, &ctx).await,
        };

        let reply = result.unwrap_or_else(|err| Reply::text(err.to_string()));
        if let Err(err) = self.edit(&ctx.token, &reply).await {
            log::error!("failed to edit deferred response for {id}: {err}");
        }
    }

    /// Replaces the deferred response with `reply`.
    async fn edit(&self, token: &str, reply: &Reply) -> error::Result<()> {
        let client = self.client.interaction(self.app);
        let mut update = client.update_response(token).content(reply.content.as_deref()).map_err(invalid)?;
        if !reply.embeds.is_empty() {
            update = update.embeds(Some(reply.embeds.as_slice())).map_err(invalid)?;
        }
        if let Some(components) = &reply.components {
            update = update.components(Some(components.as_slice())).map_err(invalid)?;
        }
        if !reply.attachments.is_empty() {
            update = update.attachments(&reply.attachments).map_err(invalid)?;
        }
        update.await.map_err(|err| {
            log::error!("Discord rejected a response edit: {err}");
            Error::Platform
        })?;
        Ok(())
    }

    /// Fetches a poll. A missing record means the message outlived it, so its controls get disabled.
    async fn load(&self, poll: u64, ctx: &Context) -> error::Result<Poll> {
        match self.db.get_poll(poll).await {
            Ok(poll) => Ok(poll),
            Err(db::error::Error::NotFound) => Err(self.orphan(poll, ctx).await),
            Err(err) => Err(err.into()),
        }
    }

    async fn orphan(&self, poll: u64, ctx: &Context) -> Error {
        log::warn!("poll {poll} no longer exists");
        let Some(source) = ctx.source.as_ref().filter(|source| source.message == poll) else {
            return Error::Orphaned;
        };

        let mut components = source.components.clone();
        components::disable_all(&mut components);
        let result = match (id(source.channel), id(source.message)) {
            (Ok(channel), Ok(message)) => {
                match self.client.update_message(channel, message).components(Some(components.as_slice())) {
                    Ok(update) => update.await.map(drop).map_err(|err| error::classify(&err, ctx.app_permissions)),
                    Err(err) => Err(invalid(err)),
                }
            }
            _ => Err(Error::Schema),
        };

        if let Err(err) = result {
            log::error!("failed to disable controls of orphaned poll {poll}: {err}");
        }
        Error::Orphaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(user: u64, roles: &[u64], permissions: Permissions) -> Context {
        Context {
            token: String::new(),
            user,
            roles: roles.to_vec(),
            permissions,
            app_permissions: None,
            locale: String::from("en-US"),
            values: Vec::new(),
            source: None,
        }
    }

    fn poll(creator: u64) -> Poll {
        Poll {
            id: 1,
            guild: 2,
            channel: 3,
            creator,
            title: String::from("Drinks"),
            description: None,
            options: Vec::from([String::from("Tea"), String::from("Coffee")]),
            active: true,
            created_at: Default::default(),
            settings: Default::default(),
        }
    }

    #[test]
    fn managers_need_permission_or_role() {
        let guild = GuildSettings { manager_role: Some(50), ..Default::default() };
        assert!(context(1, &[], Permissions::MANAGE_GUILD).is_manager(&guild));
        assert!(context(1, &[7, 50], Permissions::empty()).is_manager(&guild));
        assert!(!context(1, &[7], Permissions::SEND_MESSAGES).is_manager(&guild));
        assert!(!context(1, &[50], Permissions::empty()).is_manager(&GuildSettings::default()));
    }

    #[test]
    fn creators_may_browse_their_polls() {
        let guild = GuildSettings::default();
        assert!(context(9, &[], Permissions::empty()).may_browse(&poll(9), &guild));
        assert!(!context(8, &[], Permissions::empty()).may_browse(&poll(9), &guild));
        assert!(context(8, &[], Permissions::MANAGE_GUILD).may_browse(&poll(9), &guild));
    }
}

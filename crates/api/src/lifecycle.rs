use crate::{
    components,
    error::{self, Error, Result},
    id, invalid, members, render, Context, Inner, Reply,
};
use alloc::{string::String, vec::Vec};
use model::{
    render::{Mode, RenderRequest},
    GuildSettings, Poll, Tally,
};
use twilight_model::{
    channel::message::{Component, Embed},
    http::attachment::Attachment,
};

/// Everything painted onto a poll message, derived from a single read of the stored poll.
struct Card {
    request: RenderRequest,
    controls: Vec<Component>,
    embed: Embed,
}

impl Card {
    fn new(poll: &Poll, labels: Vec<String>, creator: String, tally: &Tally, show_buttons: bool, locale: &str) -> Self {
        let shown = poll.shows_results().then_some(tally);
        let request = render::request(poll, labels, creator, shown, Mode::Card, locale);
        let controls = components::poll_controls(poll, &request.options, show_buttons);
        Self { request, controls, embed: components::poll_embed(poll) }
    }
}

impl Inner {
    /// Closes (`active == false`) or reopens a poll, then repaints it.
    pub(crate) async fn on_lifecycle(&self, poll: u64, active: bool, ctx: &Context) -> Result<Reply> {
        let poll = self.load(poll, ctx).await?;
        let guild = self.db.get_guild_settings(poll.guild).await?;
        if !ctx.is_manager(&guild) {
            log::warn!("user {} may not change the state of poll {}", ctx.user, poll.id);
            return Err(Error::PermissionDenied);
        }

        match self.db.set_active(poll.id, active).await {
            Ok(()) => (),
            Err(db::error::Error::NotFound) => return Err(self.orphan(poll.id, ctx).await),
            Err(err) => return Err(err.into()),
        }
        log::info!("user {} {} poll {}", ctx.user, if active { "reopened" } else { "closed" }, poll.id);

        self.refresh(poll.id, &guild, ctx).await?;
        Ok(Reply::text(if active { "The poll has been reopened." } else { "The poll has been closed." }))
    }

    /// Recomputes the tally and repaints the poll message with a fresh image and controls.
    pub(crate) async fn refresh(&self, poll: u64, guild: &GuildSettings, ctx: &Context) -> Result<()> {
        let ticket = self.refreshes.begin(poll);
        let result = self.repaint(poll, guild, ctx, ticket).await;
        self.refreshes.finish(poll);
        result
    }

    async fn repaint(&self, poll: u64, guild: &GuildSettings, ctx: &Context, ticket: u64) -> Result<()> {
        // Read after the ticket was taken, so the newest ticket also holds the newest state.
        let poll = self.db.get_poll(poll).await?;
        let tally = self.db.get_tally(poll.id, poll.options.len()).await?;
        let labels = members::labels(&self.client, &poll).await;
        let creator = members::display_name(&self.client, poll.guild, poll.creator).await;
        let Card { request, controls, embed } = Card::new(&poll, labels, creator, &tally, guild.show_buttons, &ctx.locale);
        let png = self.renderer.render(&request).await?;

        // A newer refresh has started since ours, so its image wins.
        if self.refreshes.is_stale(poll.id, ticket) {
            log::debug!("dropping stale render of poll {}", poll.id);
            return Ok(());
        }

        let embeds = [embed];
        let attachments = [Attachment::from_bytes(String::from(components::POLL_IMAGE), png, 0)];
        self.client
            .update_message(id(poll.channel)?, id(poll.id)?)
            .attachments(&attachments)
            .map_err(invalid)?
            .components(Some(controls.as_slice()))
            .map_err(invalid)?
            .embeds(Some(embeds.as_slice()))
            .map_err(invalid)?
            .await
            .map_err(|err| error::classify(&err, ctx.app_permissions))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::Settings;

    fn poll(active: bool) -> Poll {
        Poll {
            id: 5,
            guild: 6,
            channel: 7,
            creator: 8,
            title: String::from("Lunch"),
            description: None,
            options: Vec::from([String::from("Pizza"), String::from("Salad")]),
            active,
            created_at: Default::default(),
            settings: Settings { public: false, ..Default::default() },
        }
    }

    fn custom_ids(components: &[Component]) -> Vec<String> {
        use twilight_model::channel::message::component::{ActionRow, Button, SelectMenu};
        let mut out = Vec::new();
        for component in components {
            match component {
                Component::ActionRow(ActionRow { components }) => out.extend(custom_ids(components)),
                Component::Button(Button { custom_id: Some(id), .. }) => out.push(id.clone()),
                Component::SelectMenu(SelectMenu { custom_id, .. }) => out.push(custom_id.clone()),
                _ => (),
            }
        }
        out
    }

    #[test]
    fn closed_poll_paints_final_results() {
        let stored = poll(false);
        let tally = Tally::from_votes(2, [(0, 2), (1, 4)]);
        let card = Card::new(&stored, stored.options.clone(), String::from("Ann"), &tally, true, "en-US");
        assert!(card.request.closed);
        assert_eq!(card.request.counts.as_deref(), Some(&[2, 4][..]));
        assert_eq!(custom_ids(&card.controls), ["reopen_5", "results_5", "view_5_first_0_0"]);
        assert!(card.embed.footer.is_some());
    }

    #[test]
    fn open_private_poll_hides_counts() {
        let stored = poll(true);
        let tally = Tally::from_votes(2, [(0, 2)]);
        let card = Card::new(&stored, stored.options.clone(), String::from("Ann"), &tally, true, "en-US");
        assert!(!card.request.closed);
        assert_eq!(card.request.counts, None);
        assert_eq!(custom_ids(&card.controls), ["vote_5", "close_5", "view_5_first_0_0"]);
        assert!(card.embed.footer.is_none());
    }
}

use crate::{error::Result, Context, Inner, Reply};
use alloc::{format, string::String};
use core::fmt::Write;
use model::{
    ballot::{self, Check},
    weight, Poll,
};

/// Confirmation shown to the voter after their ballot was stored.
fn acknowledgement(poll: &Poll, choices: &[u16], weight: u32) -> String {
    let mut text = String::from("Your vote for ");
    for (i, &choice) in choices.iter().enumerate() {
        if i > 0 {
            text.push_str(", ");
        }
        let label = poll.label(choice).unwrap_or("?");
        let _ = write!(text, "**{}. {label}**", choice + 1);
    }
    text.push_str(" was recorded");
    if weight > 1 {
        let _ = write!(text, " with a weight of **{weight}**");
    }
    text.push('.');
    text
}

impl Inner {
    /// Validates, stores, and reflects one ballot.
    pub(crate) async fn on_vote(&self, poll: u64, ctx: &Context) -> Result<Reply> {
        let poll = self.load(poll, ctx).await?;
        let existing = self.db.get_ballot(poll.id, ctx.user).await?;

        let choices = match ballot::check(&poll, &ctx.roles, &existing, &ctx.values)? {
            Check::Unchanged => return Ok(Reply::text("Your selection is unchanged.")),
            Check::Replace(choices) => choices,
        };

        let guild = self.db.get_guild_settings(poll.guild).await?;
        let weight = weight::resolve(&ctx.roles, &guild.weights, &poll.settings.vote_weights);
        match self.db.replace_ballot(poll.id, ctx.user, &choices, weight).await {
            Ok(()) => (),
            Err(db::error::Error::Orphaned) => return Err(self.orphan(poll.id, ctx).await),
            Err(err) => return Err(err.into()),
        }
        log::info!("user {} voted {choices:?} with weight {weight} on poll {}", ctx.user, poll.id);

        // The ballot is stored at this point, so the voter hears about it even if the repaint fails.
        let mut text = acknowledgement(&poll, &choices, weight);
        if let Err(err) = self.refresh(poll.id, &guild, ctx).await {
            log::error!("failed to refresh poll {} after a vote: {err}", poll.id);
            text = format!("{text}\n{err}");
        }
        Ok(Reply::text(text))
    }
}

//! Read-only paths: detailed results, the voter-roll browser, and exports.

use crate::{
    components,
    error::{Error, Result},
    id, members, render, Context, Inner, Reply,
};
use alloc::{format, string::String, vec, vec::Vec};
use core::fmt::Write;
use db::TryStreamExt;
use model::{
    export::{self, CsvRow, Voter},
    page::Page,
    render::Mode,
    token::{Action, ViewToken},
    Poll, Vote,
};
use twilight_model::http::attachment::Attachment;

/// Body of one browser page.
fn roll_text(label: &str, page: &Page, voters: &[Voter]) -> String {
    let mut text = format!("**Voters for {label}**\n");
    if voters.is_empty() {
        text.push_str("Nobody has voted for this option yet.");
        return text;
    }

    let _ = writeln!(text, "Page {} of {} · {} voters\n", page.index + 1, page.last + 1, page.voters);
    for (voter, n) in voters.iter().zip(page.offset() + 1..) {
        let _ = writeln!(text, "{n}. {} ({})", voter.shown_name(), voter.username);
    }
    text
}

impl Inner {
    async fn check_browser(&self, poll: &Poll, ctx: &Context) -> Result<()> {
        let guild = self.db.get_guild_settings(poll.guild).await?;
        if ctx.may_browse(poll, &guild) {
            Ok(())
        } else {
            log::warn!("user {} may not browse voters of poll {}", ctx.user, poll.id);
            Err(Error::PermissionDenied)
        }
    }

    /// Detailed multi-panel breakdown, sent privately to the requester.
    pub(crate) async fn on_results(&self, poll: u64, ctx: &Context) -> Result<Reply> {
        let poll = self.load(poll, ctx).await?;
        if !poll.shows_results() {
            self.check_browser(&poll, ctx).await?;
        }

        let tally = self.db.get_tally(poll.id, poll.options.len()).await?;
        let labels = members::labels(&self.client, &poll).await;
        let creator = members::display_name(&self.client, poll.guild, poll.creator).await;
        let request = render::request(&poll, labels, creator, Some(&tally), Mode::Detailed, &ctx.locale);
        let png = self.renderer.render(&request).await?;

        Ok(Reply {
            embeds: vec![components::image_embed(&poll.title, None, components::RESULTS_IMAGE, None)],
            attachments: vec![Attachment::from_bytes(String::from(components::RESULTS_IMAGE), png, 0)],
            ..Default::default()
        })
    }

    /// Serves one voter-roll browser token. Every click re-derives its page from the store.
    pub(crate) async fn on_view(&self, token: ViewToken, ctx: &Context) -> Result<Reply> {
        let poll = self.load(token.poll, ctx).await?;
        self.check_browser(&poll, ctx).await?;

        let option = match token.action {
            Action::Select => {
                ctx.values.first().and_then(|value| value.parse().ok()).ok_or(Error::InvalidSelection)?
            }
            _ => token.option,
        };
        if poll.label(option).is_none() {
            return Err(Error::InvalidSelection);
        }

        if token.action == Action::Export {
            return self.export_option(&poll, option).await;
        }

        let voters = self.db.count_voters(poll.id, option).await?;
        let last = Page::clamp(0, voters).last;
        let page = Page::clamp(token.action.target(token.page, last), voters);
        let ids = self.db.get_voters_page(poll.id, option, page.limit(), page.offset()).await?;
        let roll = members::voters(&self.client, id(poll.guild)?, &ids).await;

        let labels = members::labels(&self.client, &poll).await;
        let label = format!("{}. {}", option + 1, labels.get(usize::from(option)).map_or("", String::as_str));
        Ok(Reply {
            content: Some(roll_text(&label, &page, &roll)),
            components: Some(components::browser_controls(&poll, &labels, &page, option)),
            ..Default::default()
        })
    }

    /// Every voter of one option as a text file.
    async fn export_option(&self, poll: &Poll, option: u16) -> Result<Reply> {
        if !poll.settings.allow_exports {
            return Err(Error::ExportsDisabled);
        }

        let ids = self.db.get_all_voters(poll.id, option).await?;
        let roll = members::voters(&self.client, id(poll.guild)?, &ids).await;
        let file = export::voter_lines(&roll);
        log::info!("exported {} voters of option {option} on poll {}", roll.len(), poll.id);

        let label = poll.label(option).unwrap_or("?");
        let name = format!("poll-{}-option-{}.txt", poll.id, option + 1);
        Ok(Reply {
            content: Some(format!("{} voters for **{}. {label}**.", roll.len(), option + 1)),
            attachments: vec![Attachment::from_bytes(name, file.into_bytes(), 0)],
            ..Default::default()
        })
    }

    /// Every vote of the poll as CSV.
    pub(crate) async fn on_csv(&self, poll: u64, ctx: &Context) -> Result<Reply> {
        let poll = self.load(poll, ctx).await?;
        self.check_browser(&poll, ctx).await?;
        if !poll.settings.allow_exports {
            return Err(Error::ExportsDisabled);
        }

        let votes: Vec<Vote> = self.db.get_votes(poll.id).await?.try_collect().await?;
        let mut ids: Vec<_> = votes.iter().map(|vote| vote.user).collect();
        ids.sort_unstable();
        ids.dedup();
        let voters = members::voters(&self.client, id(poll.guild)?, &ids).await;

        // `voters` follows the sorted order of `ids`.
        let rows = votes.iter().filter_map(|vote| {
            let index = voters.binary_search_by_key(&vote.user, |voter| voter.id).ok()?;
            Some(CsvRow {
                voter: &voters[index],
                option: vote.option,
                label: poll.label(vote.option).unwrap_or(""),
                timestamp: vote.created_at,
            })
        });
        let file = export::csv(rows);
        log::info!("exported {} votes of poll {} as CSV", votes.len(), poll.id);

        Ok(Reply {
            content: Some(format!("{} votes from {} voters.", votes.len(), voters.len())),
            attachments: vec![Attachment::from_bytes(format!("poll-{}.csv", poll.id), file.into_bytes(), 0)],
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voter(id: u64, nickname: Option<&str>) -> Voter {
        Voter {
            id,
            username: format!("user{id}"),
            display_name: format!("User {id}"),
            nickname: nickname.map(String::from),
        }
    }

    #[test]
    fn numbers_rows_across_pages() {
        let page = Page::clamp(1, 17);
        let text = roll_text("2. Coffee", &page, &[voter(16, None), voter(17, Some("Seventeen"))]);
        assert_eq!(
            text,
            "**Voters for 2. Coffee**\nPage 2 of 2 · 17 voters\n\n16. User 16 (user16)\n17. Seventeen (user17)\n"
        );
    }

    #[test]
    fn reports_empty_rolls() {
        let text = roll_text("1. Tea", &Page::clamp(0, 0), &[]);
        assert_eq!(text, "**Voters for 1. Tea**\nNobody has voted for this option yet.");
    }
}

//! Message components and embeds attached to poll messages and voter-roll browsers.

use alloc::{
    format,
    string::{String, ToString},
    vec,
    vec::Vec,
};
use model::{
    page::Page,
    token::{Action, CustomId, ViewToken},
    Poll,
};
use twilight_model::channel::message::{
    component::{ActionRow, Button, ButtonStyle, SelectMenu, SelectMenuOption},
    embed::{EmbedFooter, EmbedImage},
    Component, Embed,
};

pub const POLL_IMAGE: &str = "poll.png";
pub const RESULTS_IMAGE: &str = "results.png";

/// Discord rejects component labels longer than this.
const MAX_COMPONENT_LABEL: usize = 100;

fn truncate(label: String) -> String {
    if label.chars().count() <= MAX_COMPONENT_LABEL {
        return label;
    }
    let mut out: String = label.chars().take(MAX_COMPONENT_LABEL - 1).collect();
    out.push('…');
    out
}

fn button(id: CustomId, label: &str, style: ButtonStyle, disabled: bool) -> Component {
    Component::Button(Button {
        custom_id: Some(id.to_string()),
        disabled,
        emoji: None,
        label: Some(String::from(label)),
        style,
        url: None,
    })
}

fn row(components: Vec<Component>) -> Component {
    Component::ActionRow(ActionRow { components })
}

fn option_list(labels: &[String], selected: Option<u16>) -> Vec<SelectMenuOption> {
    labels
        .iter()
        .zip(0u16..)
        .map(|(label, index)| SelectMenuOption {
            default: selected == Some(index),
            description: None,
            emoji: None,
            label: truncate(format!("{}. {label}", index + 1)),
            value: index.to_string(),
        })
        .collect()
}

/// Opens the voter-roll browser on the first option.
pub fn voters_token(poll: u64) -> CustomId {
    CustomId::View(ViewToken::new(poll, Action::First, 0, 0))
}

/// Controls of a poll message. `labels` are the option labels with mentions resolved.
pub fn poll_controls(poll: &Poll, labels: &[String], show_buttons: bool) -> Vec<Component> {
    let results = button(CustomId::Results(poll.id), "Results", ButtonStyle::Secondary, false);
    let voters = button(voters_token(poll.id), "Voters", ButtonStyle::Secondary, false);

    if !poll.active {
        let mut buttons = Vec::with_capacity(3);
        if show_buttons {
            buttons.push(button(CustomId::Reopen(poll.id), "Reopen", ButtonStyle::Success, false));
        }
        buttons.push(results);
        buttons.push(voters);
        return vec![row(buttons)];
    }

    let select = Component::SelectMenu(SelectMenu {
        custom_id: CustomId::Vote(poll.id).to_string(),
        disabled: false,
        max_values: Some(poll.settings.max_votes),
        min_values: Some(poll.settings.min_votes),
        options: option_list(labels, None),
        placeholder: Some(String::from("Cast your vote")),
    });

    let mut buttons = Vec::with_capacity(3);
    if poll.settings.allow_close && show_buttons {
        buttons.push(button(CustomId::Close(poll.id), "Close", ButtonStyle::Danger, false));
    }
    if poll.settings.public {
        buttons.push(results);
    }
    buttons.push(voters);

    vec![row(vec![select]), row(buttons)]
}

/// Disables every interactive component in place.
pub fn disable_all(components: &mut [Component]) {
    for component in components {
        match component {
            Component::ActionRow(ActionRow { components }) => disable_all(components),
            Component::Button(Button { disabled, .. }) | Component::SelectMenu(SelectMenu { disabled, .. }) => {
                *disabled = true;
            }
            _ => (),
        }
    }
}

/// Controls of the voter-roll browser for `option` at the given page.
pub fn browser_controls(poll: &Poll, labels: &[String], page: &Page, option: u16) -> Vec<Component> {
    let token = ViewToken::new(poll.id, Action::Select, page.index, option);
    let select = Component::SelectMenu(SelectMenu {
        custom_id: token.to_string(),
        disabled: false,
        max_values: Some(1),
        min_values: Some(1),
        options: option_list(labels, Some(option)),
        placeholder: Some(String::from("Choose an option")),
    });

    let exports = !poll.settings.allow_exports;
    let nav = |action, label, disabled| button(CustomId::View(token.with(action)), label, ButtonStyle::Secondary, disabled);
    let buttons = vec![
        nav(Action::First, "«", !page.has_prev()),
        nav(Action::Prev, "‹", !page.has_prev()),
        button(CustomId::View(token.with(Action::Export)), "Export", ButtonStyle::Primary, exports),
        nav(Action::Next, "›", !page.has_next()),
        nav(Action::Last, "»", !page.has_next()),
    ];
    let csv = button(CustomId::Csv(poll.id), "Export all (CSV)", ButtonStyle::Primary, exports);

    vec![row(vec![select]), row(buttons), row(vec![csv])]
}

/// Embed that frames an uploaded image.
pub fn image_embed(title: &str, description: Option<&str>, image: &str, footer: Option<&str>) -> Embed {
    Embed {
        author: None,
        color: Some(0x5865F2),
        description: description.map(String::from),
        fields: Vec::new(),
        footer: footer.map(|text| EmbedFooter { icon_url: None, proxy_icon_url: None, text: String::from(text) }),
        image: Some(EmbedImage { height: None, proxy_url: None, url: format!("attachment://{image}"), width: None }),
        kind: String::from("rich"),
        provider: None,
        thumbnail: None,
        timestamp: None,
        title: Some(String::from(title)),
        url: None,
        video: None,
    }
}

pub fn poll_embed(poll: &Poll) -> Embed {
    let footer = if poll.active { None } else { Some("This poll is closed.") };
    image_embed(&poll.title, poll.description.as_deref(), POLL_IMAGE, footer)
}

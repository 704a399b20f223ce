//! A basic fallback formatter for generating text previews of room events.
//!
//! This covers the event types that have no special display rules of their own:
//! * regular messages of every `msgtype`
//! * membership and profile changes
//! * common room state changes (name, topic, join rules, etc.)

use serde_json::Value;

use crate::{
    content::{MessageContent, ROOM_MESSAGE_EVENT_TYPE, is_empty_content, string_field},
    event::{Event, RoomState},
    event_display::EventFormatter,
    utils,
};

/// What should be displayed before the text preview of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeforeText {
    /// Nothing should be displayed before the text preview.
    Nothing,
    /// The sender's username with a colon should be displayed before the text preview.
    UsernameWithColon,
    /// The sender's username (without a colon) should be displayed before the text preview.
    UsernameWithoutColon,
}

/// A text preview of an event, plus how a username should be displayed before it.
///
/// Call [`TextPreview::format_with()`] to generate displayable text
/// with the appropriately-formatted preceding username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPreview {
    text: String,
    before_text: BeforeText,
}
impl From<(String, BeforeText)> for TextPreview {
    fn from((text, before_text): (String, BeforeText)) -> Self {
        Self { text, before_text }
    }
}
impl TextPreview {
    /// Formats the text preview with the appropriate preceding username.
    ///
    /// If a `username_color` (`0xRRGGBB`) is given, the username is drawn in that color.
    pub fn format_with(self, username: &str, username_color: Option<u32>) -> String {
        let Self { text, before_text } = self;
        let username = match username_color {
            Some(color) => format!("<font color=\"#{:06x}\">{username}</font>", color & 0xFF_FFFF),
            None => username.to_owned(),
        };
        match before_text {
            BeforeText::Nothing => text,
            BeforeText::UsernameWithColon => format!("<b>{username}</b>: {text}"),
            BeforeText::UsernameWithoutColon => format!("{username} {text}"),
        }
    }
}

/// The default [`EventFormatter`], producing Html-formatted text previews.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicEventFormatter;

impl EventFormatter for BasicEventFormatter {
    fn format(
        &self,
        display_name_color: Option<u32>,
        event: &Event,
        room_state: &dyn RoomState,
    ) -> Option<String> {
        let sender_username = room_state.member_name(&event.sender);
        text_preview_of_event(event, &sender_username, room_state)
            .map(|preview| preview.format_with(&sender_username, display_name_color))
    }
}

/// Returns a text preview of the given event, if it is of a supported type.
pub fn text_preview_of_event(
    event: &Event,
    sender_username: &str,
    room_state: &dyn RoomState,
) -> Option<TextPreview> {
    let content = &event.content;
    match event.event_type.as_str() {
        ROOM_MESSAGE_EVENT_TYPE if content.is_object() => Some(text_preview_of_message(content, sender_username)),
        "m.sticker" => Some(TextPreview::from((
            format!("[Sticker]: <i>{}</i>", string_field(content, "body").present().unwrap_or_default()),
            BeforeText::UsernameWithColon,
        ))),
        "m.room.encrypted" => Some(TextPreview::from((
            String::from("[Unable to decrypt message]"),
            BeforeText::UsernameWithColon,
        ))),
        "m.call.invite" => Some(TextPreview::from((
            String::from("[Call Invitation]"),
            BeforeText::UsernameWithColon,
        ))),
        "m.room.member" => text_preview_of_room_membership_change(event, sender_username, room_state),
        _ if event.state_key.is_some() => text_preview_of_other_state(event),
        _ => None,
    }
}

/// Returns a text preview of the given message content as an Html-formatted string.
pub fn text_preview_of_message(content: &Value, sender_username: &str) -> TextPreview {
    let message = MessageContent::new(content);
    let Some(body) = message.body().present() else {
        return TextPreview::from((
            String::from("[Message was deleted]"),
            BeforeText::UsernameWithColon,
        ));
    };
    let formatted_or_body = || {
        message.html_body().ok().unwrap_or(body)
    };
    let text = match message.msgtype().present().unwrap_or("m.text") {
        "m.audio" => format!("[Audio]: <i>{}</i>", formatted_or_body()),
        "m.emote" => {
            return TextPreview::from((
                format!("<i>{} {}</i>", sender_username, formatted_or_body()),
                BeforeText::Nothing,
            ));
        }
        "m.file" => format!("[File]: <i>{}</i>", formatted_or_body()),
        "m.image" => format!("[Image]: <i>{}</i>", formatted_or_body()),
        "m.location" => format!("[Location]: <i>{}</i>", body),
        "m.notice" => format!("[Notice]: <i>{}</i>", formatted_or_body()),
        "m.server_notice" => format!(
            "[Server Notice]: <i>{} -- {}</i>",
            string_field(content, "server_notice_type").present().unwrap_or("unknown"),
            body,
        ),
        // Html bodies already carry their own links.
        "m.text" => match message.html_body().ok() {
            Some(html) => html.to_owned(),
            None => utils::linkify(body).into_owned(),
        },
        "m.key.verification.request" => format!(
            "[Verification Request] <i>from device {} to user {}</i>",
            string_field(content, "from_device").present().unwrap_or("unknown"),
            string_field(content, "to").present().unwrap_or("unknown"),
        ),
        "m.video" => format!("[Video]: <i>{}</i>", formatted_or_body()),
        _other => format!("[Unknown message type]: {}", body),
    };
    TextPreview::from((text, BeforeText::UsernameWithColon))
}

/// Returns a text preview of the given other state event as an Html-formatted string.
pub fn text_preview_of_other_state(event: &Event) -> Option<TextPreview> {
    let content = &event.content;
    let state_key = event.state_key.as_deref().unwrap_or_default();
    let text = match event.event_type.as_str() {
        "m.room.aliases" => {
            let aliases: Vec<&str> = content.get("aliases")
                .and_then(Value::as_array)
                .map(|aliases| aliases.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            Some(format!("set this room's aliases to {}.", aliases.join(", ")))
        }
        "m.room.avatar" => {
            Some(String::from("set this room's avatar picture."))
        }
        "m.room.canonical_alias" => {
            Some(format!("set the main address of this room to {}.",
                string_field(content, "alias").present().unwrap_or("none")
            ))
        }
        "m.room.create" => {
            Some(format!("created this room (v{}).",
                string_field(content, "room_version").present().unwrap_or("1")
            ))
        }
        "m.room.encryption" => {
            Some(String::from("enabled encryption in this room."))
        }
        "m.room.guest_access" => {
            Some(match string_field(content, "guest_access").present() {
                Some("can_join") => String::from("has allowed guests to join this room."),
                _ => String::from("has forbidden guests from joining this room."),
            })
        }
        "m.room.history_visibility" => {
            let visibility = match string_field(content, "history_visibility").present() {
                Some("invited") => "invited users, since they were invited.",
                Some("joined") => "joined users, since they joined.",
                Some("shared") => "joined users, for all of time.",
                _ => "anyone for all time.",
            };
            Some(format!("set this room's history to be visible by {}", visibility))
        }
        "m.room.join_rules" => {
            Some(match string_field(content, "join_rule").present() {
                Some("public") => String::from("set this room to be joinable by anyone."),
                Some("knock") => String::from("set this room to be joinable by invite only or by request."),
                Some("private") => String::from("set this room to be private."),
                Some("restricted") => String::from("set this room to be joinable by invite only or with restrictions."),
                Some("knock_restricted") => String::from("set this room to be joinable by invite only or requestable with restrictions."),
                _ => String::from("set this room to be joinable by invite only."),
            })
        }
        "m.room.pinned_events" => {
            let pinned = content.get("pinned").and_then(Value::as_array).map_or(0, Vec::len);
            Some(format!("pinned {} events in this room.", pinned))
        }
        "m.room.name" => {
            Some(format!("changed this room's name to {:?}.",
                string_field(content, "name").present().unwrap_or_default()
            ))
        }
        "m.room.power_levels" => {
            Some(String::from("set the power levels for this room."))
        }
        "m.room.server_acl" => {
            Some(String::from("set the server access control list for this room."))
        }
        "m.room.tombstone" => {
            Some(format!("closed this room and upgraded it to {}",
                string_field(content, "replacement_room").present().unwrap_or("a new room")
            ))
        }
        "m.room.topic" => {
            Some(format!("changed this room's topic to {:?}.",
                string_field(content, "topic").present().unwrap_or_default()
            ))
        }
        "m.space.parent" => {
            Some(format!("set this room's parent space to {}.", state_key))
        }
        "m.space.child" if !is_empty_content(content) => {
            Some(format!("added a new child to this space: {}.", state_key))
        }
        _other => None,
    };
    text.map(|t| TextPreview::from((t, BeforeText::UsernameWithoutColon)))
}

/// Returns a text preview of the given member profile change as an Html-formatted string.
///
/// Returns `None` if neither the display name nor the avatar changed.
pub fn text_preview_of_member_profile_change(
    content: &Value,
    prev_content: &Value,
    username: &str,
) -> Option<TextPreview> {
    let new_name = string_field(content, "displayname").present();
    let old_name = string_field(prev_content, "displayname").present();
    let name_text = if new_name != old_name {
        let old = old_name.unwrap_or(username);
        if let Some(new) = new_name {
            format!("{old} changed their display name to {new:?}")
        } else {
            format!("{old} removed their display name")
        }
    } else {
        String::new()
    };
    let avatar_changed = string_field(content, "avatar_url").present()
        != string_field(prev_content, "avatar_url").present();
    let avatar_text = if avatar_changed {
        if name_text.is_empty() {
            format!("{} changed their profile picture", username)
        } else {
            String::from(" and changed their profile picture")
        }
    } else {
        String::new()
    };
    if name_text.is_empty() && avatar_text.is_empty() {
        return None;
    }

    Some(TextPreview::from((
        format!("{}{}.", name_text, avatar_text),
        BeforeText::Nothing,
    )))
}

/// Returns a text preview of the given room membership change as an Html-formatted string.
pub fn text_preview_of_room_membership_change(
    event: &Event,
    sender_username: &str,
    room_state: &dyn RoomState,
) -> Option<TextPreview> {
    let change_user_id = event.state_key.as_deref()?;
    let content = &event.content;
    let prev_content = event.prev_content.as_ref().unwrap_or(&Value::Null);
    let membership = string_field(content, "membership").present()?;
    let prev_membership = string_field(prev_content, "membership").present();
    let change_user_name = string_field(content, "displayname").present()
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| room_state.member_name(change_user_id));
    let is_self = event.sender == change_user_id;

    let text = match (prev_membership, membership) {
        (Some("join"), "join") => {
            return text_preview_of_member_profile_change(content, prev_content, sender_username);
        }
        (Some("invite"), "join") =>
            String::from("accepted an invitation to this room."),
        (_, "join") =>
            String::from("joined this room."),
        (Some("invite"), "leave") if is_self =>
            String::from("rejected an invitation to this room."),
        (Some("knock"), "leave") if is_self =>
            String::from("retracted their request to join this room."),
        (_, "leave") if is_self =>
            String::from("left this room."),
        (Some("ban"), "leave") =>
            format!("unbanned {} from this room.", change_user_name),
        (Some("invite"), "leave") =>
            format!("revoked {}'s invitation to this room.", change_user_name),
        (Some("knock"), "leave") =>
            format!("denied {}'s request to join this room.", change_user_name),
        (_, "leave") =>
            format!("kicked {} from this room.", change_user_name),
        (Some("join"), "ban") =>
            format!("kicked and banned {} from this room.", change_user_name),
        (_, "ban") =>
            format!("banned {} from this room.", change_user_name),
        (Some("knock"), "invite") =>
            format!("accepted {}'s request to join this room.", change_user_name),
        (_, "invite") =>
            format!("invited {} to this room.", change_user_name),
        (_, "knock") =>
            String::from("requested to join this room."),
        _ => {
            // Don't actually display anything for unknown membership changes.
            return None;
        }
    };
    Some(TextPreview::from((text, BeforeText::UsernameWithoutColon)))
}

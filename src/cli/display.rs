use chrono::{DateTime, Datelike, Utc};

use crate::models::{Contact, PresenceState};

/// Lines of a full contact view (only non-empty fields).
pub fn contact_lines(contact: &Contact) -> Vec<String> {
    let mut lines = vec![contact.display_label_or_default().to_string(), String::new()];

    if let Some(nickname) = contact.nickname.as_deref().filter(|n| !n.is_empty()) {
        lines.push(format!("  \"{}\"", nickname));
    }

    if let Some(presence) = &contact.global_presence {
        if presence.state != PresenceState::Unknown {
            let mut line = format!("  [{}]", presence.state.as_str());
            if !presence.custom_message.is_empty() {
                line.push_str(&format!(" {}", presence.custom_message));
            }
            lines.push(line);
        }
    }

    for org in &contact.organizations {
        if let Some(text) = org.title_at_name() {
            lines.push(format!("  {}", text));
        }
    }

    for email in &contact.email_addresses {
        lines.push(format!("  {}", email.email_address));
    }

    for phone in &contact.phone_numbers {
        lines.push(format!("  {}", phone.number));
    }

    for account in &contact.online_accounts {
        lines.push(format!("  {}", account.account_uri));
    }

    // Addresses - city, state only for brevity
    for addr in &contact.addresses {
        if let Some(loc) = addr.locality_region() {
            lines.push(format!("  {}", loc));
        }
    }

    if let Some(birthday) = &contact.birthday {
        lines.push(format!("  Born {}", format_birthday(birthday)));
    }

    for url in &contact.urls {
        lines.push(format!("  {}", url.url));
    }

    for note in &contact.notes {
        if !note.note.is_empty() {
            lines.push(format!("  {}", truncate(&note.note, 60)));
        }
    }

    lines
}

/// Print a full contact detail with clean formatting
pub fn print_full_contact(contact: &Contact) {
    for line in contact_lines(contact) {
        println!("{}", line);
    }
}

pub fn format_birthday(date: &DateTime<Utc>) -> String {
    format!("{} {}, {}", month_abbrev(date.month()), date.day(), date.year())
}

fn month_abbrev(month: u32) -> &'static str {
    match month {
        1 => "Jan",
        2 => "Feb",
        3 => "Mar",
        4 => "Apr",
        5 => "May",
        6 => "Jun",
        7 => "Jul",
        8 => "Aug",
        9 => "Sep",
        10 => "Oct",
        11 => "Nov",
        12 => "Dec",
        _ => "???",
    }
}

/// First line of `text`, cut to `max_len` characters.
pub fn truncate(text: &str, max_len: usize) -> String {
    let trimmed = text.lines().next().unwrap_or("").trim();

    if trimmed.chars().count() <= max_len {
        trimmed.to_string()
    } else {
        let truncated: String = trimmed.chars().take(max_len - 1).collect();
        format!("{}…", truncated.trim_end())
    }
}

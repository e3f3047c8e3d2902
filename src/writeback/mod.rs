//! Write-back of contact records into the engine.
//!
//! `create` builds a full detail set for a new persona; `update` walks the
//! fixed chain of per-group steps against an existing persona.

pub mod create;
pub mod update;

pub use create::{create_contact, details_from_contact};
pub use update::{run_update, PendingWriteBack, StepOutcome, UpdateReport, UpdateStep};

use chrono::{DateTime, Timelike, Utc};

use crate::engine::{
    self, AvatarIcon, FieldDetails, ImAddresses, PostalAddress, Role, StructuredName,
};
use crate::models::{
    Address, Avatar, ContactUrl, Context, EmailAddress, Gender, Name, Note, OnlineAccount,
    Organization, PhoneNumber, Protocol,
};
use crate::translate;

/// True when the two detail lists differ as multisets.
pub fn details_changed<T: PartialEq>(previous: &[T], proposed: &[T]) -> bool {
    if previous.len() != proposed.len() {
        return true;
    }
    let mut unmatched: Vec<&T> = previous.iter().collect();
    for detail in proposed {
        match unmatched.iter().position(|p| *p == detail) {
            Some(i) => {
                unmatched.swap_remove(i);
            }
            None => return true,
        }
    }
    false
}

fn string_details<'a, I>(values: I) -> Vec<FieldDetails<String>>
where
    I: IntoIterator<Item = (&'a str, &'a [Context])>,
{
    values
        .into_iter()
        .filter(|(value, _)| !value.is_empty())
        .map(|(value, contexts)| {
            translate::tagged(value.to_string(), translate::context_tags(contexts))
        })
        .collect()
}

pub(crate) fn postal_addresses(addresses: &[Address]) -> Vec<FieldDetails<PostalAddress>> {
    addresses
        .iter()
        .filter(|a| !a.is_empty())
        .map(|a| {
            let mut tags = translate::context_tags(&a.contexts);
            tags.extend(translate::address_sub_type_tags(&a.sub_types));
            translate::tagged(
                PostalAddress {
                    po_box: a.post_office_box.clone(),
                    extension: String::new(),
                    street: a.street.clone(),
                    locality: a.locality.clone(),
                    region: a.region.clone(),
                    postal_code: a.postcode.clone(),
                    country: a.country.clone(),
                },
                tags,
            )
        })
        .collect()
}

pub(crate) fn avatar_icon(avatar: Option<&Avatar>) -> Option<AvatarIcon> {
    avatar
        .filter(|a| !a.image_url.is_empty())
        .map(|a| AvatarIcon::File {
            uri: a.image_url.clone(),
        })
}

/// The engine keeps birthdays as whole Unix seconds.
pub(crate) fn birthday(value: DateTime<Utc>) -> DateTime<Utc> {
    value.with_nanosecond(0).unwrap_or(value)
}

pub(crate) fn email_addresses(emails: &[EmailAddress]) -> Vec<FieldDetails<String>> {
    string_details(
        emails
            .iter()
            .map(|e| (e.email_address.as_str(), e.contexts.as_slice())),
    )
}

pub(crate) fn notes(notes: &[Note]) -> Vec<FieldDetails<String>> {
    string_details(notes.iter().map(|n| (n.note.as_str(), n.contexts.as_slice())))
}

pub(crate) fn urls(urls: &[ContactUrl]) -> Vec<FieldDetails<String>> {
    string_details(urls.iter().map(|u| (u.url.as_str(), u.contexts.as_slice())))
}

pub(crate) fn phone_numbers(phones: &[PhoneNumber]) -> Vec<FieldDetails<String>> {
    phones
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| {
            let mut tags = translate::context_tags(&p.contexts);
            tags.extend(translate::phone_sub_type_tags(&p.sub_types));
            translate::tagged(p.number.clone(), tags)
        })
        .collect()
}

/// Accounts grouped by protocol tag. Accounts with an unknown protocol or an
/// empty URI have no engine representation and are skipped.
pub(crate) fn im_addresses(accounts: &[OnlineAccount]) -> ImAddresses {
    let mut grouped = ImAddresses::new();
    for account in accounts {
        if account.account_uri.is_empty() || account.protocol == Protocol::Unknown {
            continue;
        }
        let Some(protocol) = translate::protocol_tag(account.protocol) else {
            continue;
        };
        let mut tags = translate::context_tags(&account.contexts);
        tags.extend(translate::online_account_sub_type_tags(&account.sub_types));
        grouped
            .entry(protocol.to_string())
            .or_default()
            .push(translate::tagged(account.account_uri.clone(), tags));
    }
    grouped
}

pub(crate) fn roles(organizations: &[Organization]) -> Vec<FieldDetails<Role>> {
    organizations
        .iter()
        .filter(|o| !o.is_empty())
        .map(|o| {
            translate::tagged(
                Role {
                    title: o.title.clone(),
                    organisation_name: o.name.clone(),
                    role: o.role.clone(),
                },
                translate::context_tags(&o.contexts),
            )
        })
        .collect()
}

pub(crate) fn structured_name(name: Option<&Name>) -> Option<StructuredName> {
    let name = name.filter(|n| !n.is_empty())?;
    let part = |p: &Option<String>| p.clone().unwrap_or_default();
    Some(StructuredName {
        family_name: part(&name.last_name),
        given_name: part(&name.first_name),
        additional_names: part(&name.middle_name),
        prefixes: part(&name.prefix),
        suffixes: part(&name.suffix),
    })
}

pub(crate) fn gender(gender: Option<Gender>) -> engine::Gender {
    match gender {
        Some(Gender::Male) => engine::Gender::Male,
        Some(Gender::Female) => engine::Gender::Female,
        Some(Gender::Unspecified) | None => engine::Gender::Unspecified,
    }
}

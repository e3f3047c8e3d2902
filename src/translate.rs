//! Category tags shared with the engine.
//!
//! Contexts and sub-types of a detail both travel in the `"type"` parameter of
//! the engine's field details. The tables are fixed; tags that no table
//! knows are dropped when reading.

use crate::engine::FieldDetails;
use crate::models::{AddressSubType, Context, OnlineAccountSubType, PhoneSubType, Protocol};

const CONTEXTS: [(Context, &str); 3] = [
    (Context::Home, "home"),
    (Context::Work, "work"),
    (Context::Other, "other"),
];

const ADDRESS_SUB_TYPES: [(AddressSubType, &str); 4] = [
    (AddressSubType::Parcel, "parcel"),
    (AddressSubType::Postal, "postal"),
    (AddressSubType::Domestic, "domestic"),
    (AddressSubType::International, "international"),
];

const PROTOCOLS: [(Protocol, &str); 8] = [
    (Protocol::Aim, "aim"),
    (Protocol::Icq, "icq"),
    (Protocol::Irc, "irc"),
    (Protocol::Jabber, "jabber"),
    (Protocol::Msn, "msn"),
    (Protocol::Qq, "qq"),
    (Protocol::Skype, "skype"),
    (Protocol::Yahoo, "yahoo"),
];

const ONLINE_ACCOUNT_SUB_TYPES: [(OnlineAccountSubType, &str); 4] = [
    (OnlineAccountSubType::Sip, "sip"),
    (OnlineAccountSubType::SipVoip, "sipvoip"),
    (OnlineAccountSubType::Impp, "impp"),
    (OnlineAccountSubType::VideoShare, "videoshare"),
];

const PHONE_SUB_TYPES: [(PhoneSubType, &str); 12] = [
    (PhoneSubType::Landline, "landline"),
    (PhoneSubType::Mobile, "mobile"),
    (PhoneSubType::Fax, "fax"),
    (PhoneSubType::Pager, "pager"),
    (PhoneSubType::Voice, "voice"),
    (PhoneSubType::Modem, "modem"),
    (PhoneSubType::Video, "video"),
    (PhoneSubType::Car, "car"),
    (PhoneSubType::BulletinBoardSystem, "bulletinboard"),
    (PhoneSubType::MessagingCapable, "messaging"),
    (PhoneSubType::Assistant, "assistant"),
    (PhoneSubType::DtmfMenu, "dtmfmenu"),
];

fn to_tags<E: Copy + PartialEq>(table: &[(E, &'static str)], values: &[E]) -> Vec<String> {
    values
        .iter()
        .filter_map(|v| table.iter().find(|(e, _)| e == v).map(|(_, t)| t.to_string()))
        .collect()
}

fn from_tags<E: Copy + PartialEq>(table: &[(E, &'static str)], tags: &[String]) -> Vec<E> {
    let mut values = Vec::new();
    for tag in tags {
        if let Some((e, _)) = table.iter().find(|(_, t)| t == tag) {
            if !values.contains(e) {
                values.push(*e);
            }
        }
    }
    values
}

pub fn context_tags(contexts: &[Context]) -> Vec<String> {
    to_tags(&CONTEXTS, contexts)
}

pub fn contexts_from_tags(tags: &[String]) -> Vec<Context> {
    from_tags(&CONTEXTS, tags)
}

pub fn address_sub_type_tags(sub_types: &[AddressSubType]) -> Vec<String> {
    to_tags(&ADDRESS_SUB_TYPES, sub_types)
}

pub fn address_sub_types_from_tags(tags: &[String]) -> Vec<AddressSubType> {
    from_tags(&ADDRESS_SUB_TYPES, tags)
}

/// Engine tag for a protocol; `None` for [`Protocol::Unknown`].
pub fn protocol_tag(protocol: Protocol) -> Option<&'static str> {
    PROTOCOLS
        .iter()
        .find(|(p, _)| *p == protocol)
        .map(|(_, t)| *t)
}

pub fn protocol_from_tag(tag: &str) -> Protocol {
    PROTOCOLS
        .iter()
        .find(|(_, t)| *t == tag)
        .map(|(p, _)| *p)
        .unwrap_or_default()
}

pub fn online_account_sub_type_tags(sub_types: &[OnlineAccountSubType]) -> Vec<String> {
    to_tags(&ONLINE_ACCOUNT_SUB_TYPES, sub_types)
}

pub fn online_account_sub_types_from_tags(tags: &[String]) -> Vec<OnlineAccountSubType> {
    from_tags(&ONLINE_ACCOUNT_SUB_TYPES, tags)
}

pub fn phone_sub_type_tags(sub_types: &[PhoneSubType]) -> Vec<String> {
    to_tags(&PHONE_SUB_TYPES, sub_types)
}

pub fn phone_sub_types_from_tags(tags: &[String]) -> Vec<PhoneSubType> {
    from_tags(&PHONE_SUB_TYPES, tags)
}

/// Tags carried by a detail. Only the `"type"` parameter is consulted.
pub fn tags_of<T>(details: &FieldDetails<T>) -> Vec<String> {
    details.types().to_vec()
}

/// Wrap a value with its tags.
pub fn tagged<T>(value: T, tags: Vec<String>) -> FieldDetails<T> {
    FieldDetails::new(value).with_types(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TYPE_PARAMETER;

    fn strings(tags: &[&str]) -> Vec<String> {
        tags.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_context_tags() {
        assert_eq!(
            context_tags(&[Context::Home, Context::Work, Context::Other]),
            strings(&["home", "work", "other"])
        );
        assert_eq!(
            contexts_from_tags(&strings(&["work", "mobile", "home", "work"])),
            vec![Context::Work, Context::Home]
        );
    }

    #[test]
    fn test_mixed_tags_split_by_table() {
        let tags = strings(&["home", "mobile", "fax", "parcel"]);
        assert_eq!(contexts_from_tags(&tags), vec![Context::Home]);
        assert_eq!(
            phone_sub_types_from_tags(&tags),
            vec![PhoneSubType::Mobile, PhoneSubType::Fax]
        );
        assert_eq!(address_sub_types_from_tags(&tags), vec![AddressSubType::Parcel]);
    }

    #[test]
    fn test_protocols() {
        assert_eq!(protocol_tag(Protocol::Jabber), Some("jabber"));
        assert_eq!(protocol_tag(Protocol::Unknown), None);
        assert_eq!(protocol_from_tag("skype"), Protocol::Skype);
        assert_eq!(protocol_from_tag("gadugadu"), Protocol::Unknown);
    }

    #[test]
    fn test_every_phone_sub_type_has_a_tag() {
        let all: Vec<PhoneSubType> = PHONE_SUB_TYPES.iter().map(|(p, _)| *p).collect();
        let tags = phone_sub_type_tags(&all);
        assert_eq!(tags.len(), 12);
        assert_eq!(phone_sub_types_from_tags(&tags), all);
        assert_eq!(
            online_account_sub_type_tags(&[OnlineAccountSubType::SipVoip]),
            strings(&["sipvoip"])
        );
    }

    #[test]
    fn test_tags_ignore_other_parameters() {
        let mut fd = tagged("x".to_string(), strings(&["home", "home"]));
        fd.add_parameter("pref", "1");
        assert_eq!(fd.parameter_values(TYPE_PARAMETER).len(), 1);
        assert_eq!(tags_of(&fd), strings(&["home"]));
    }
}

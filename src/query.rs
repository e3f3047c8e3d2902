//! In-memory filtering and sorting of contact records.

use std::cmp::Ordering;
use tracing::debug;

use crate::models::{CollectionId, Contact, ContactId};

/// Contact detail a filter or sort order looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailField {
    DisplayLabel,
    FirstName,
    LastName,
    Nickname,
    Email,
    Phone,
    Organization,
    Note,
    Url,
    OnlineAccount,
}

impl DetailField {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "label" | "display_label" | "name" => Some(Self::DisplayLabel),
            "first" | "first_name" => Some(Self::FirstName),
            "last" | "last_name" => Some(Self::LastName),
            "nickname" => Some(Self::Nickname),
            "email" => Some(Self::Email),
            "phone" => Some(Self::Phone),
            "org" | "organization" => Some(Self::Organization),
            "note" | "notes" => Some(Self::Note),
            "url" => Some(Self::Url),
            "im" | "online_account" => Some(Self::OnlineAccount),
            _ => None,
        }
    }

    /// Every value of this field on the contact, in detail order.
    pub fn values<'a>(&self, contact: &'a Contact) -> Vec<&'a str> {
        match self {
            Self::DisplayLabel => contact.display_label.as_deref().into_iter().collect(),
            Self::FirstName => contact
                .name
                .as_ref()
                .and_then(|n| n.first_name.as_deref())
                .into_iter()
                .collect(),
            Self::LastName => contact
                .name
                .as_ref()
                .and_then(|n| n.last_name.as_deref())
                .into_iter()
                .collect(),
            Self::Nickname => contact.nickname.as_deref().into_iter().collect(),
            Self::Email => contact
                .email_addresses
                .iter()
                .map(|e| e.email_address.as_str())
                .collect(),
            Self::Phone => contact.phone_numbers.iter().map(|p| p.number.as_str()).collect(),
            Self::Organization => contact.organizations.iter().map(|o| o.name.as_str()).collect(),
            Self::Note => contact.notes.iter().map(|n| n.note.as_str()).collect(),
            Self::Url => contact.urls.iter().map(|u| u.url.as_str()).collect(),
            Self::OnlineAccount => contact
                .online_accounts
                .iter()
                .map(|a| a.account_uri.as_str())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchFlag {
    #[default]
    Exactly,
    Contains,
    StartsWith,
    EndsWith,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Filter {
    /// Matches every contact.
    #[default]
    Default,
    IdList(Vec<ContactId>),
    Detail {
        field: DetailField,
        value: String,
        match_flag: MatchFlag,
        case_sensitive: bool,
    },
    Intersection(Vec<Filter>),
    Union(Vec<Filter>),
    /// Collections are not implemented; the filter is logged and matches all.
    Collection(Vec<CollectionId>),
}

impl Filter {
    pub fn detail(field: DetailField, value: &str, match_flag: MatchFlag) -> Self {
        Self::Detail {
            field,
            value: value.to_string(),
            match_flag,
            case_sensitive: false,
        }
    }

    pub fn matches(&self, contact: &Contact) -> bool {
        match self {
            Self::Default => true,
            Self::IdList(ids) => contact.id.as_ref().is_some_and(|id| ids.contains(id)),
            Self::Detail {
                field,
                value,
                match_flag,
                case_sensitive,
            } => field
                .values(contact)
                .into_iter()
                .any(|v| text_matches(v, value, *match_flag, *case_sensitive)),
            Self::Intersection(filters) => filters.iter().all(|f| f.matches(contact)),
            Self::Union(filters) => filters.iter().any(|f| f.matches(contact)),
            Self::Collection(ids) => {
                debug!(collections = ?ids, "collection filter ignored");
                true
            }
        }
    }
}

fn text_matches(candidate: &str, wanted: &str, flag: MatchFlag, case_sensitive: bool) -> bool {
    let (candidate, wanted) = if case_sensitive {
        (candidate.to_string(), wanted.to_string())
    } else {
        (candidate.to_lowercase(), wanted.to_lowercase())
    };
    match flag {
        MatchFlag::Exactly => candidate == wanted,
        MatchFlag::Contains => candidate.contains(&wanted),
        MatchFlag::StartsWith => candidate.starts_with(&wanted),
        MatchFlag::EndsWith => candidate.ends_with(&wanted),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "asc" => Some(Self::Ascending),
            "desc" => Some(Self::Descending),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlankPolicy {
    BlanksFirst,
    #[default]
    BlanksLast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    pub field: DetailField,
    pub direction: SortDirection,
    pub blank_policy: BlankPolicy,
    pub case_sensitive: bool,
}

impl SortOrder {
    pub fn new(field: DetailField) -> Self {
        Self {
            field,
            direction: SortDirection::Ascending,
            blank_policy: BlankPolicy::BlanksLast,
            case_sensitive: false,
        }
    }

    pub fn descending(mut self) -> Self {
        self.direction = SortDirection::Descending;
        self
    }

    pub fn compare(&self, a: &Contact, b: &Contact) -> Ordering {
        let key = |c: &Contact| {
            self.field
                .values(c)
                .into_iter()
                .next()
                .filter(|v| !v.is_empty())
                .map(|v| {
                    if self.case_sensitive {
                        v.to_string()
                    } else {
                        v.to_lowercase()
                    }
                })
        };
        match (key(a), key(b)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => match self.blank_policy {
                BlankPolicy::BlanksFirst => Ordering::Less,
                BlankPolicy::BlanksLast => Ordering::Greater,
            },
            (Some(_), None) => match self.blank_policy {
                BlankPolicy::BlanksFirst => Ordering::Greater,
                BlankPolicy::BlanksLast => Ordering::Less,
            },
            (Some(x), Some(y)) => match self.direction {
                SortDirection::Ascending => x.cmp(&y),
                SortDirection::Descending => y.cmp(&x),
            },
        }
    }
}

pub fn compare_contacts(a: &Contact, b: &Contact, orders: &[SortOrder]) -> Ordering {
    orders
        .iter()
        .map(|o| o.compare(a, b))
        .find(|ord| *ord != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// Insert keeping `list` sorted; equal contacts keep insertion order.
pub fn add_sorted(list: &mut Vec<Contact>, contact: Contact, orders: &[SortOrder]) {
    let at = list.partition_point(|c| compare_contacts(c, &contact, orders) != Ordering::Greater);
    list.insert(at, contact);
}

/// Linear scan applying `filter`, then sorted insertion by `orders`.
pub fn select<'a, I>(contacts: I, filter: &Filter, orders: &[SortOrder]) -> Vec<Contact>
where
    I: IntoIterator<Item = &'a Contact>,
{
    let mut out = Vec::new();
    for contact in contacts {
        if filter.matches(contact) {
            add_sorted(&mut out, contact.clone(), orders);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmailAddress, Name};

    fn contact(key: &str, label: &str, email: Option<&str>) -> Contact {
        let mut c = Contact::new();
        c.id = Some(ContactId::for_key("contacts:folks:", key));
        c.display_label = Some(label.to_string());
        c.name = Some(Name::from_full_name(label));
        if let Some(e) = email {
            c.email_addresses.push(EmailAddress::new(e));
        }
        c
    }

    fn labels(contacts: &[Contact]) -> Vec<&str> {
        contacts.iter().map(|c| c.display_label_or_default()).collect()
    }

    fn sample() -> Vec<Contact> {
        vec![
            contact("1", "john Smith", Some("john@example.com")),
            contact("2", "Alice Jones", None),
            contact("3", "Bob Brown", Some("bob@work.example")),
        ]
    }

    #[test]
    fn test_default_filter_matches_all() {
        let all = select(&sample(), &Filter::Default, &[]);
        assert_eq!(labels(&all), vec!["john Smith", "Alice Jones", "Bob Brown"]);
    }

    #[test]
    fn test_sort_by_label_is_case_insensitive_by_default() {
        let sorted = select(&sample(), &Filter::Default, &[SortOrder::new(DetailField::DisplayLabel)]);
        assert_eq!(labels(&sorted), vec!["Alice Jones", "Bob Brown", "john Smith"]);

        let desc = select(
            &sample(),
            &Filter::Default,
            &[SortOrder::new(DetailField::LastName).descending()],
        );
        assert_eq!(labels(&desc), vec!["john Smith", "Alice Jones", "Bob Brown"]);
    }

    #[test]
    fn test_blanks_last_then_first() {
        let mut order = SortOrder::new(DetailField::Email);
        let sorted = select(&sample(), &Filter::Default, &[order]);
        assert_eq!(labels(&sorted), vec!["Bob Brown", "john Smith", "Alice Jones"]);

        order.blank_policy = BlankPolicy::BlanksFirst;
        let sorted = select(&sample(), &Filter::Default, &[order]);
        assert_eq!(labels(&sorted)[0], "Alice Jones");
    }

    #[test]
    fn test_detail_filters() {
        let contains = Filter::detail(DetailField::Email, "EXAMPLE", MatchFlag::Contains);
        assert_eq!(select(&sample(), &contains, &[]).len(), 2);

        let starts = Filter::detail(DetailField::FirstName, "bo", MatchFlag::StartsWith);
        assert_eq!(labels(&select(&sample(), &starts, &[])), vec!["Bob Brown"]);

        let exact = Filter::Detail {
            field: DetailField::DisplayLabel,
            value: "JOHN SMITH".to_string(),
            match_flag: MatchFlag::Exactly,
            case_sensitive: true,
        };
        assert!(select(&sample(), &exact, &[]).is_empty());
    }

    #[test]
    fn test_compound_filters() {
        let ids = Filter::IdList(vec![ContactId::for_key("contacts:folks:", "2")]);
        let work = Filter::detail(DetailField::Email, "work", MatchFlag::Contains);
        let union = Filter::Union(vec![ids.clone(), work.clone()]);
        let both = Filter::Intersection(vec![ids, work]);

        assert_eq!(select(&sample(), &union, &[]).len(), 2);
        assert!(select(&sample(), &both, &[]).is_empty());
    }

    #[test]
    fn test_collection_filter_matches_all() {
        let filter = Filter::Collection(vec![CollectionId::new("contacts:folks:", 7)]);
        assert_eq!(select(&sample(), &filter, &[]).len(), 3);
    }

    #[test]
    fn test_add_sorted_is_stable() {
        let orders = [SortOrder::new(DetailField::DisplayLabel)];
        let mut list = Vec::new();
        add_sorted(&mut list, contact("a", "Same", None), &orders);
        add_sorted(&mut list, contact("b", "Same", None), &orders);
        add_sorted(&mut list, contact("c", "Earlier", None), &orders);
        let ids: Vec<String> = list.iter().map(|c| c.id.as_ref().unwrap().to_string()).collect();
        assert_eq!(ids[1], ContactId::for_key("contacts:folks:", "a").to_string());
        assert_eq!(ids[2], ContactId::for_key("contacts:folks:", "b").to_string());
    }
}

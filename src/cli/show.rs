use anyhow::{anyhow, Result};

use super::display::print_full_contact;
use super::list::ContactListRow;
use crate::manager::Manager;
use crate::models::{Contact, ContactId, CONTACT_TOKEN_PREFIX};
use crate::query::{DetailField, Filter, MatchFlag, SortOrder};

/// Contacts matching `identifier`: a local id, or words that must all
/// appear in the display label.
pub fn find_contacts(manager: &Manager, identifier: &str) -> Result<Vec<Contact>> {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return Err(anyhow!("Identifier cannot be empty."));
    }

    if identifier.starts_with(CONTACT_TOKEN_PREFIX) {
        let id = ContactId::new(manager.manager_uri(), identifier);
        return Ok(manager.contact(&id).into_iter().collect());
    }

    let filter = Filter::Intersection(
        identifier
            .split_whitespace()
            .map(|word| Filter::detail(DetailField::DisplayLabel, word, MatchFlag::Contains))
            .collect(),
    );
    Ok(manager.contacts(&filter, &[SortOrder::new(DetailField::DisplayLabel)]))
}

/// Execute the show command
pub fn run_show(manager: &Manager, identifier: &str) -> Result<()> {
    let results = find_contacts(manager, identifier)?;

    match results.as_slice() {
        [] => println!("No matches."),
        [contact] => print_full_contact(contact),
        many => {
            println!("{} matches for \"{}\":\n", many.len(), identifier.trim());
            for contact in many {
                println!("{}", ContactListRow::from_contact(contact).format());
            }
        }
    }
    Ok(())
}

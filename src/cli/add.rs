use anyhow::{anyhow, bail, Result};

use crate::manager::Manager;
use crate::models::{Contact, EmailAddress, Name, Note, PhoneNumber};
use crate::request::{Request, RequestState};

/// Build a new contact from command-line fields.
pub fn contact_from_args(
    name: &str,
    email: Option<String>,
    phone: Option<String>,
    notes: Option<String>,
) -> Result<Contact> {
    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("Name cannot be empty."));
    }

    let mut contact = Contact::new();
    contact.display_label = Some(name.to_string());
    contact.name = Some(Name::from_full_name(name));
    contact.email_addresses.extend(email.map(EmailAddress::new));
    contact.phone_numbers.extend(phone.map(PhoneNumber::new));
    contact.notes.extend(notes.map(Note::new));
    Ok(contact)
}

pub async fn run_add(
    manager: &Manager,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    notes: Option<String>,
) -> Result<()> {
    let contact = contact_from_args(&name, email, phone, notes)?;
    let request = Request::save(vec![contact]);
    manager.start_request(&request);
    if request.wait_finished().await != RequestState::Finished {
        bail!("save request did not finish");
    }

    let results = request.results();
    if let Some(err) = results.error {
        bail!("could not add {}: {}", name.trim(), err);
    }
    manager.process_pending_events();
    match results.contacts.first().and_then(|c| c.id.as_ref()) {
        Some(id) => println!("Added {} ({})", name.trim(), id.local_id),
        None => println!("Added {}", name.trim()),
    }
    Ok(())
}

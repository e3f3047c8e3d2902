use anyhow::{bail, Result};

use super::show::find_contacts;
use crate::manager::Manager;
use crate::request::{Request, RequestState};

/// Remove the single contact matching `identifier`.
pub async fn run_delete(manager: &Manager, identifier: &str) -> Result<()> {
    let matches = find_contacts(manager, identifier)?;
    let contact = match matches.as_slice() {
        [] => {
            println!("No matches.");
            return Ok(());
        }
        [contact] => contact,
        many => bail!(
            "{} contacts match \"{}\"; use the contact id",
            many.len(),
            identifier.trim()
        ),
    };
    let Some(id) = contact.id.clone() else {
        bail!("contact has no id");
    };

    let request = Request::remove(vec![id]);
    manager.start_request(&request);
    if request.wait_finished().await != RequestState::Finished {
        bail!("remove request did not finish");
    }
    if let Some(err) = request.results().error {
        bail!("could not delete {}: {}", contact.display_label_or_default(), err);
    }
    manager.process_pending_events();
    println!("Deleted {}.", contact.display_label_or_default());
    Ok(())
}

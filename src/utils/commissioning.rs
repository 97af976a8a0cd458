use crate::base::address::Short;
use crate::base::command::DaliCommandCode::{
    Compare, Initialize, ProgramShortAddress, Randomize, Terminate, VerifyShortAddress, Withdraw,
};
use crate::base::response::DaliResponse;
use crate::foxtron::frame::FoxtronResponse;
use crate::foxtron::master::{FoxtronDaliMaster, MasterError};
use log::{debug, info};

/// One ballast given a short address during commissioning.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Assigned {
    pub short: Short,
    pub random_address: u32,
    /// The ballast confirmed the programmed address.
    pub verified: bool,
}

/// A yes on the bus: any answer at all, including a collision of
/// several ballasts answering at once.
fn is_yes(resp: &Option<FoxtronResponse>) -> bool {
    let Some(exchange) = resp.as_ref().and_then(|r| r.exchange()) else {
        return false;
    };
    exchange.framing_error
        || matches!(exchange.dali_response(), Some(Ok(DaliResponse::Bool(true))))
}

async fn compare(master: &FoxtronDaliMaster, search: u32) -> Result<bool, MasterError> {
    master.set_search_address(search).await?;
    let resp = master.send_special(Compare, 0).await?;
    Ok(is_yes(&resp))
}

/// Binary search for the lowest random address still taking part in
/// the discovery process. `None` when nothing answers any more.
async fn isolate_lowest(master: &FoxtronDaliMaster) -> Result<Option<u32>, MasterError> {
    if !compare(master, 0xffffff).await? {
        return Ok(None);
    }
    let mut low = 0u32;
    let mut high = 0xffffffu32;
    while low < high {
        let mid = low + (high - low) / 2;
        if compare(master, mid).await? {
            high = mid;
        } else {
            low = mid + 1;
        }
    }
    debug!("Isolated ballast with random address {:#08x}", low);
    Ok(Some(low))
}

/// Assign short addresses to every unaddressed ballast on the bus,
/// counting up from `first`. Ballasts already withdrawn keep their
/// addresses. Runs the full discovery cycle and always terminates the
/// special command session before returning.
pub async fn assign_addresses(
    master: &FoxtronDaliMaster,
    first: Short,
) -> Result<Vec<Assigned>, MasterError> {
    master.send_special(Terminate, 0).await?;
    master.send_special(Initialize, 0xff).await?;
    master.send_special(Randomize, 0).await?;

    let mut assigned = Vec::new();
    let mut next = first.value();
    let result = loop {
        let random_address = match isolate_lowest(master).await {
            Ok(Some(r)) => r,
            Ok(None) => break Ok(assigned),
            Err(e) => break Err(e),
        };
        let Ok(short) = Short::from_value(next) else {
            info!("Out of short addresses, {:#08x} left unassigned", random_address);
            break Ok(assigned);
        };
        match program_one(master, random_address, short).await {
            Ok(entry) => assigned.push(entry),
            Err(e) => break Err(e),
        }
        next += 1;
    };
    master.send_special(Terminate, 0).await?;
    result
}

/// Assign one short address to the lowest answering ballast.
pub async fn assign_single(
    master: &FoxtronDaliMaster,
    short: Short,
) -> Result<Option<Assigned>, MasterError> {
    master.send_special(Terminate, 0).await?;
    master.send_special(Initialize, 0xff).await?;
    master.send_special(Randomize, 0).await?;
    let result = match isolate_lowest(master).await {
        Ok(Some(random_address)) => program_one(master, random_address, short).await.map(Some),
        Ok(None) => Ok(None),
        Err(e) => Err(e),
    };
    master.send_special(Terminate, 0).await?;
    result
}

async fn program_one(
    master: &FoxtronDaliMaster,
    random_address: u32,
    short: Short,
) -> Result<Assigned, MasterError> {
    master.set_search_address(random_address).await?;
    master
        .send_special(ProgramShortAddress, short.value() as u32)
        .await?;
    let verify = master
        .send_special(VerifyShortAddress, short.value() as u32)
        .await?;
    let verified = is_yes(&verify);
    if !verified {
        info!("Ballast {:#08x} did not confirm address {}", random_address, short);
    }
    master.send_special(Withdraw, 0).await?;
    info!(
        "Assigned short address {} to ballast {:#08x}",
        short, random_address
    );
    Ok(Assigned {
        short,
        random_address,
        verified,
    })
}

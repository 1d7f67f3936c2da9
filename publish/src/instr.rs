use solana_sdk::compute_budget::ComputeBudgetInstruction;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use solana_sdk::sysvar::clock;
use solana_sdk::transaction::Transaction;

use accounts::{CmdUpdPrice, Command, PC_VERSION_2};
use crate::state::PendingEntry;

/// Builds the instruction data for one `upd_price` wire record: a fixed
/// little-endian struct the on-chain program deserializes with `bytemuck`,
/// matching the `cmd_upd_price_t` layout in the account wire crate.
fn upd_price_instruction_data(entry: &PendingEntry) -> [u8; std::mem::size_of::<CmdUpdPrice>()] {
  let record = CmdUpdPrice {
    version: PC_VERSION_2,
    cmd: Command::UpdPrice as u32,
    status: entry.status as u32,
    unused: 0,
    price: entry.price,
    conf: entry.conf,
    pub_slot: entry.pub_slot,
  };
  bytemuck::bytes_of(&record).try_into().expect("CmdUpdPrice is Pod-sized")
}

fn upd_price_instruction(program_id: Pubkey, publisher: Pubkey, price_account: Pubkey, entry: &PendingEntry) -> Instruction {
  Instruction {
    program_id,
    accounts: vec![
      AccountMeta::new(publisher, true),
      AccountMeta::new(price_account, false),
      AccountMeta::new_readonly(clock::id(), false),
    ],
    data: upd_price_instruction_data(entry).to_vec(),
  }
}

/// Assembles and signs one batch transaction. When `cu_units`/`cu_price` are
/// non-zero, prefixes the instruction list with compute-budget instructions
/// the same way the teacher's transaction builder attaches a priority fee,
/// generalized here from a fixed tip to whatever the daemon's configuration
/// asks for.
pub fn build_batch_transaction(
  program_id: Pubkey,
  publisher: &Keypair,
  batch: &[(Pubkey, PendingEntry)],
  recent_blockhash: Hash,
  cu_units: u32,
  cu_price: u64,
) -> Transaction {
  let mut instructions = Vec::new();
  if cu_units > 0 {
    instructions.push(ComputeBudgetInstruction::set_compute_unit_limit(cu_units));
  }
  if cu_price > 0 {
    instructions.push(ComputeBudgetInstruction::set_compute_unit_price(cu_price));
  }
  for (price_account, entry) in batch {
    instructions.push(upd_price_instruction(program_id, publisher.pubkey(), *price_account, entry));
  }
  let message = Message::new(&instructions, Some(&publisher.pubkey()));
  let mut tx = Transaction::new_unsigned(message);
  tx.sign(&[publisher], recent_blockhash);
  tx
}

#[cfg(test)]
mod tests {
  use super::*;
  use accounts::PriceStatus;

  #[test]
  fn upd_price_record_matches_wire_size() {
    let entry = PendingEntry::default();
    let data = upd_price_instruction_data(&entry);
    assert_eq!(data.len(), std::mem::size_of::<CmdUpdPrice>());
  }

  #[test]
  fn batch_transaction_carries_one_instruction_per_account_plus_compute_budget() {
    let program_id = Pubkey::new_unique();
    let publisher = Keypair::new();
    let mut entry = PendingEntry::default();
    entry.price = 100;
    entry.conf = 1;
    entry.status = PriceStatus::Trading;
    let batch = vec![(Pubkey::new_unique(), entry.clone()), (Pubkey::new_unique(), entry)];
    let tx = build_batch_transaction(program_id, &publisher, &batch, Hash::default(), 50_000, 1);
    // 2 compute-budget instructions + 2 upd_price instructions
    assert_eq!(tx.message.instructions.len(), 4);
  }

  #[test]
  fn upd_price_instruction_carries_the_clock_sysvar() {
    let program_id = Pubkey::new_unique();
    let publisher = Pubkey::new_unique();
    let price_account = Pubkey::new_unique();
    let entry = PendingEntry::default();
    let ix = upd_price_instruction(program_id, publisher, price_account, &entry);
    assert_eq!(ix.accounts.len(), 3);
    assert_eq!(ix.accounts[2].pubkey, solana_sdk::sysvar::clock::id());
    assert!(!ix.accounts[2].is_signer);
    assert!(!ix.accounts[2].is_writable);
  }
}

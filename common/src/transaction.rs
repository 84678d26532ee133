// Chain transaction wire model.
//
// The relay never executes transactions, it only validates, co-signs and
// forwards them, so the model covers exactly what those steps need: the
// message header signer accounting, the account table, the recent blockhash
// and the instruction list. Layout matches the chain's legacy format
// (compact-u16 collection lengths, signatures before the message).

use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use lazy_static::lazy_static;
use thiserror::Error;

use crate::{
    config::{MAX_TRANSACTION_SIZE, NATIVE_MINT_ID, SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID},
    crypto::{verify_signature, Hash, Keypair, Pubkey, Signature},
    serializer::{Reader, ReaderError, Serializer, Writer},
};

lazy_static! {
    pub static ref SYSTEM_PROGRAM: Pubkey =
        Pubkey::from_str(SYSTEM_PROGRAM_ID).expect("valid system program id");
    pub static ref TOKEN_PROGRAM: Pubkey =
        Pubkey::from_str(TOKEN_PROGRAM_ID).expect("valid token program id");
    pub static ref NATIVE_MINT: Pubkey =
        Pubkey::from_str(NATIVE_MINT_ID).expect("valid native mint");
}

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Invalid base64 payload")]
    InvalidBase64,

    #[error("Transaction too large: {0} bytes")]
    TooLarge(usize),

    #[error(transparent)]
    Malformed(#[from] ReaderError),

    #[error("Signature count {signatures} does not match required signers {required}")]
    SignatureCountMismatch { signatures: usize, required: usize },

    #[error("Required signers exceed the account table")]
    HeaderOverflow,

    #[error("Transaction has no fee payer account")]
    MissingFeePayer,

    #[error("Account {0} is not a required signer of this transaction")]
    NotASigner(Pubkey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed: u8,
    pub num_readonly_unsigned: u8,
}

impl Serializer for MessageHeader {
    fn write(&self, writer: &mut Writer) {
        writer.write_u8(self.num_required_signatures);
        writer.write_u8(self.num_readonly_signed);
        writer.write_u8(self.num_readonly_unsigned);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Self {
            num_required_signatures: reader.read_u8()?,
            num_readonly_signed: reader.read_u8()?,
            num_readonly_unsigned: reader.read_u8()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    pub data: Vec<u8>,
}

impl Serializer for CompiledInstruction {
    fn write(&self, writer: &mut Writer) {
        writer.write_u8(self.program_id_index);
        self.accounts.write(writer);
        self.data.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Self {
            program_id_index: reader.read_u8()?,
            accounts: Vec::<u8>::read(reader)?,
            data: Vec::<u8>::read(reader)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub account_keys: Vec<Pubkey>,
    pub recent_blockhash: Hash,
    pub instructions: Vec<CompiledInstruction>,
}

impl Serializer for Message {
    fn write(&self, writer: &mut Writer) {
        self.header.write(writer);
        self.account_keys.write(writer);
        self.recent_blockhash.write(writer);
        self.instructions.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Self {
            header: MessageHeader::read(reader)?,
            account_keys: Vec::<Pubkey>::read(reader)?,
            recent_blockhash: Hash::read(reader)?,
            instructions: Vec::<CompiledInstruction>::read(reader)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub signatures: Vec<Signature>,
    pub message: Message,
}

impl Serializer for Transaction {
    fn write(&self, writer: &mut Writer) {
        self.signatures.write(writer);
        self.message.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Self {
            signatures: Vec::<Signature>::read(reader)?,
            message: Message::read(reader)?,
        })
    }
}

impl Transaction {
    /// Decode from the base64 HTTP envelope, enforcing the wire size cap and
    /// the header/signature-count consistency rules.
    pub fn from_base64(encoded: &str) -> Result<Self, TransactionError> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|_| TransactionError::InvalidBase64)?;
        if bytes.len() > MAX_TRANSACTION_SIZE {
            return Err(TransactionError::TooLarge(bytes.len()));
        }
        let tx = Transaction::from_bytes(&bytes)?;
        tx.validate_shape()?;
        Ok(tx)
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.to_bytes())
    }

    fn validate_shape(&self) -> Result<(), TransactionError> {
        let required = self.message.header.num_required_signatures as usize;
        if required > self.message.account_keys.len() {
            return Err(TransactionError::HeaderOverflow);
        }
        if self.signatures.len() != required {
            return Err(TransactionError::SignatureCountMismatch {
                signatures: self.signatures.len(),
                required,
            });
        }
        if required == 0 {
            return Err(TransactionError::MissingFeePayer);
        }
        Ok(())
    }

    pub fn message_bytes(&self) -> Vec<u8> {
        self.message.to_bytes()
    }

    // First account is the fee payer by convention
    pub fn fee_payer(&self) -> Option<&Pubkey> {
        self.message.account_keys.first()
    }

    pub fn signer_index(&self, pubkey: &Pubkey) -> Option<usize> {
        let required = self.message.header.num_required_signatures as usize;
        self.message.account_keys[..required.min(self.message.account_keys.len())]
            .iter()
            .position(|key| key == pubkey)
    }

    pub fn is_signer(&self, pubkey: &Pubkey) -> bool {
        self.signer_index(pubkey).is_some()
    }

    // Whether the slot holds a non-placeholder signature (not yet verified)
    pub fn has_signature_of(&self, pubkey: &Pubkey) -> bool {
        self.signer_index(pubkey)
            .and_then(|index| self.signatures.get(index))
            .map(|sig| !sig.is_placeholder())
            .unwrap_or(false)
    }

    // Cryptographic check of one signer slot against the message bytes
    pub fn verify_signature_of(&self, pubkey: &Pubkey) -> bool {
        let Some(index) = self.signer_index(pubkey) else {
            return false;
        };
        let Some(signature) = self.signatures.get(index) else {
            return false;
        };
        if signature.is_placeholder() {
            return false;
        }
        verify_signature(pubkey, &self.message_bytes(), signature)
    }

    /// Fill the signer slot belonging to `keypair` with its signature over
    /// the current message bytes. Callers computing an anti-replay
    /// fingerprint must do so before co-signing.
    pub fn co_sign(&mut self, keypair: &Keypair) -> Result<Signature, TransactionError> {
        let index = self
            .signer_index(keypair.pubkey())
            .ok_or(TransactionError::NotASigner(*keypair.pubkey()))?;
        let signature = keypair.sign(&self.message_bytes());
        self.signatures[index] = signature;
        Ok(signature)
    }

    pub fn is_fully_signed(&self) -> bool {
        !self.signatures.is_empty() && self.signatures.iter().all(|sig| !sig.is_placeholder())
    }

    // Hash of the serialized bytes as they stand right now
    pub fn fingerprint(&self) -> Hash {
        crate::crypto::hash_bytes(&self.to_bytes())
    }

    // First signature identifies the transaction on chain
    pub fn chain_signature(&self) -> Option<&Signature> {
        self.signatures.first().filter(|sig| !sig.is_placeholder())
    }
}

// ===== Construction of relay-built transactions =====
//
// The relay builds its own transactions for refund-free flows: ignition
// payouts, treasury burns and swap legs. Only the account ordering rules the
// chain requires are implemented; lookup tables and address compression are
// out of scope.

#[derive(Debug, Clone)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

#[derive(Debug, Clone)]
pub struct Instruction {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

// Native coin transfer via the system program
pub fn transfer_instruction(from: &Pubkey, to: &Pubkey, amount: u64) -> Instruction {
    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&2u32.to_le_bytes());
    data.extend_from_slice(&amount.to_le_bytes());
    Instruction {
        program_id: *SYSTEM_PROGRAM,
        accounts: vec![
            AccountMeta {
                pubkey: *from,
                is_signer: true,
                is_writable: true,
            },
            AccountMeta {
                pubkey: *to,
                is_signer: false,
                is_writable: true,
            },
        ],
        data,
    }
}

// Token supply reduction via the token program
pub fn burn_instruction(
    token_account: &Pubkey,
    mint: &Pubkey,
    authority: &Pubkey,
    amount: u64,
) -> Instruction {
    let mut data = Vec::with_capacity(9);
    data.push(8);
    data.extend_from_slice(&amount.to_le_bytes());
    Instruction {
        program_id: *TOKEN_PROGRAM,
        accounts: vec![
            AccountMeta {
                pubkey: *token_account,
                is_signer: false,
                is_writable: true,
            },
            AccountMeta {
                pubkey: *mint,
                is_signer: false,
                is_writable: true,
            },
            AccountMeta {
                pubkey: *authority,
                is_signer: true,
                is_writable: false,
            },
        ],
        data,
    }
}

/// Deterministic address of `owner`'s receiving account for `mint`.
/// Derivation is a hash of both keys under a fixed tag, so every relay
/// instance resolves the same address without a chain round trip.
pub fn derive_token_account(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    let mut preimage = Vec::with_capacity(13 + 64);
    preimage.extend_from_slice(b"token-account");
    preimage.extend_from_slice(owner.as_bytes());
    preimage.extend_from_slice(mint.as_bytes());
    Pubkey::new(crate::crypto::hash_bytes(&preimage).to_bytes())
}

/// Compile instructions into an unsigned transaction with `payer` in the fee
/// payer slot. Accounts are deduplicated and ordered writable-signers,
/// readonly-signers, writable non-signers, readonly non-signers (programs
/// last), as the chain requires.
pub fn build_transaction(
    payer: &Pubkey,
    instructions: &[Instruction],
    recent_blockhash: Hash,
) -> Transaction {
    struct Entry {
        pubkey: Pubkey,
        is_signer: bool,
        is_writable: bool,
    }

    let mut entries: Vec<Entry> = vec![Entry {
        pubkey: *payer,
        is_signer: true,
        is_writable: true,
    }];

    let mut merge = |pubkey: Pubkey, is_signer: bool, is_writable: bool| {
        if let Some(entry) = entries.iter_mut().find(|e| e.pubkey == pubkey) {
            entry.is_signer |= is_signer;
            entry.is_writable |= is_writable;
        } else {
            entries.push(Entry {
                pubkey,
                is_signer,
                is_writable,
            });
        }
    };

    for instruction in instructions {
        for account in &instruction.accounts {
            merge(account.pubkey, account.is_signer, account.is_writable);
        }
        merge(instruction.program_id, false, false);
    }

    // Stable partition keeps the payer first within its class
    let rank = |entry: &Entry| match (entry.is_signer, entry.is_writable) {
        (true, true) => 0u8,
        (true, false) => 1,
        (false, true) => 2,
        (false, false) => 3,
    };
    entries.sort_by_key(rank);

    let num_required = entries.iter().filter(|e| e.is_signer).count();
    let num_readonly_signed = entries.iter().filter(|e| e.is_signer && !e.is_writable).count();
    let num_readonly_unsigned = entries.iter().filter(|e| !e.is_signer && !e.is_writable).count();

    let account_keys: Vec<Pubkey> = entries.iter().map(|e| e.pubkey).collect();
    let index_of = |pubkey: &Pubkey| -> u8 {
        account_keys
            .iter()
            .position(|key| key == pubkey)
            .expect("merged account present") as u8
    };

    let compiled: Vec<CompiledInstruction> = instructions
        .iter()
        .map(|instruction| CompiledInstruction {
            program_id_index: index_of(&instruction.program_id),
            accounts: instruction
                .accounts
                .iter()
                .map(|account| index_of(&account.pubkey))
                .collect(),
            data: instruction.data.clone(),
        })
        .collect();

    Transaction {
        signatures: vec![Signature::zero(); num_required],
        message: Message {
            header: MessageHeader {
                num_required_signatures: num_required as u8,
                num_readonly_signed: num_readonly_signed as u8,
                num_readonly_unsigned: num_readonly_unsigned as u8,
            },
            account_keys,
            recent_blockhash,
            instructions: compiled,
        },
    }
}

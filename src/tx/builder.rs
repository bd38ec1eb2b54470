//! Mint transaction construction and signing

use crate::config::Settings;
use crate::error::{MinterError, MinterResult};

use ethers::abi::Token;
use ethers::prelude::*;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use tracing::info;

/// Builds and signs mint transactions for one token contract
///
/// Stateless given its inputs: the caller supplies the nonce and a
/// freshly fetched gas price per call. The gas limit is a fixed ceiling
/// from configuration; a mint that needs more gas fails on-chain and is
/// reported as a reverted outcome, not a process fault.
pub struct TxBuilder {
    wallet: LocalWallet,
    contract: Address,
    selector: [u8; 4],
    chain_id: u64,
    gas_limit: U256,
}

impl TxBuilder {
    /// Create a builder from validated settings, loading the signing key
    /// from the environment variable named in the wallet section
    pub fn from_settings(settings: &Settings) -> MinterResult<Self> {
        let key = std::env::var(&settings.wallet.private_key_env).map_err(|_| {
            MinterError::Wallet(format!(
                "No signing key configured. Set {}",
                settings.wallet.private_key_env
            ))
        })?;

        let wallet = parse_private_key(&key, settings.chain.chain_id)?;

        info!("Minting from wallet: {:?}", wallet.address());

        Ok(Self::new(
            wallet,
            settings.token.parsed_contract_address()?,
            settings.token.selector()?,
            settings.chain.chain_id,
            U256::from(settings.chain.gas_limit),
        ))
    }

    /// Create a builder from its parts
    pub fn new(
        wallet: LocalWallet,
        contract: Address,
        selector: [u8; 4],
        chain_id: u64,
        gas_limit: U256,
    ) -> Self {
        Self {
            wallet,
            contract,
            selector,
            chain_id,
            gas_limit,
        }
    }

    /// Address of the signing account
    pub fn sender(&self) -> Address {
        self.wallet.address()
    }

    /// ABI calldata for one mint: selector followed by the encoded
    /// `(address,uint256)` argument tuple
    pub fn calldata(&self, recipient: Address, scaled_amount: U256) -> Vec<u8> {
        let mut data = self.selector.to_vec();
        data.extend_from_slice(&ethers::abi::encode(&[
            Token::Address(recipient),
            Token::Uint(scaled_amount),
        ]));
        data
    }

    /// Build an unsigned mint transaction for the given ordering slot
    pub fn build_mint(
        &self,
        recipient: Address,
        scaled_amount: U256,
        nonce: u64,
        gas_price: U256,
    ) -> TypedTransaction {
        let tx = TransactionRequest::new()
            .from(self.wallet.address())
            .to(self.contract)
            .data(self.calldata(recipient, scaled_amount))
            .nonce(nonce)
            .gas(self.gas_limit)
            .gas_price(gas_price)
            .chain_id(self.chain_id);

        TypedTransaction::Legacy(tx)
    }

    /// Sign a built transaction into its broadcast-ready RLP encoding
    pub async fn sign(&self, tx: &TypedTransaction) -> MinterResult<Bytes> {
        let signature = self
            .wallet
            .sign_transaction(tx)
            .await
            .map_err(|e| MinterError::Sign(e.to_string()))?;

        Ok(tx.rlp_signed(&signature))
    }
}

/// Parse a hex private key (with or without 0x prefix) into a wallet
/// bound to the configured chain for EIP-155 replay protection
fn parse_private_key(key: &str, chain_id: u64) -> MinterResult<LocalWallet> {
    let key = key.trim();
    let key = key.strip_prefix("0x").unwrap_or(key);

    key.parse::<LocalWallet>()
        .map(|wallet| wallet.with_chain_id(chain_id))
        .map_err(|e| MinterError::Wallet(format!("Invalid private key: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::utils::rlp::Rlp;

    const TEST_KEY: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";
    const MINT_SELECTOR: [u8; 4] = [0x40, 0xc1, 0x0f, 0x19];

    fn test_builder() -> TxBuilder {
        TxBuilder::new(
            parse_private_key(TEST_KEY, 11155111).unwrap(),
            "0x5FbDB2315678afecb367f032d93F642f64180aa3"
                .parse()
                .unwrap(),
            MINT_SELECTOR,
            11155111,
            U256::from(200_000u64),
        )
    }

    #[test]
    fn calldata_is_selector_plus_two_words() {
        let builder = test_builder();
        let recipient: Address = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
            .parse()
            .unwrap();
        let amount = U256::from(5u64);

        let data = builder.calldata(recipient, amount);

        assert_eq!(data.len(), 4 + 32 + 32);
        assert_eq!(&data[..4], &MINT_SELECTOR[..]);
        // address is left-padded into the first word
        assert_eq!(&data[16..36], recipient.as_bytes());
        // amount is the big-endian second word
        assert_eq!(data[4 + 32 + 31], 5);
    }

    #[test]
    fn build_carries_nonce_gas_and_chain() {
        let builder = test_builder();
        let recipient: Address = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
            .parse()
            .unwrap();

        let tx = builder.build_mint(recipient, U256::from(1u64), 42, U256::from(7u64));

        assert_eq!(tx.nonce(), Some(&U256::from(42u64)));
        assert_eq!(tx.gas(), Some(&U256::from(200_000u64)));
        assert_eq!(tx.gas_price(), Some(U256::from(7u64)));
        assert_eq!(tx.chain_id(), Some(U64::from(11155111u64)));
    }

    #[tokio::test]
    async fn signed_encoding_round_trips() {
        let builder = test_builder();
        let recipient: Address = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
            .parse()
            .unwrap();

        let tx = builder.build_mint(recipient, U256::from(9u64), 3, U256::from(1u64));
        let raw = builder.sign(&tx).await.unwrap();

        let rlp = Rlp::new(raw.as_ref());
        let (decoded, _signature) = TypedTransaction::decode_signed(&rlp).unwrap();
        assert_eq!(decoded.nonce(), Some(&U256::from(3u64)));
        assert_eq!(
            decoded.to(),
            Some(&NameOrAddress::Address(builder.contract))
        );
    }
}

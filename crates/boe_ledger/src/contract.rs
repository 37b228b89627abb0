//! Generic contract method description, call encoding and result decoding.
//!
//! Any method with any argument list goes through the same path: the method's
//! parameter types are parsed once into [`DynSolType`]s, arguments are checked
//! against them, and the call is ABI-encoded behind the keccak-256 selector.

use std::collections::HashMap;

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, Bytes, U256, keccak256};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::rpc::{LedgerClient, TransactionRequest};

/// Solidity state mutability of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mutability {
    Pure,
    View,
    Nonpayable,
    Payable,
}

impl Mutability {
    /// Read-only methods go through `eth_call`; the rest need a transaction.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Mutability::Pure | Mutability::View)
    }
}

fn parse_types(types: &[&str]) -> Result<Vec<DynSolType>, LedgerError> {
    types
        .iter()
        .map(|t| DynSolType::parse(t).map_err(|e| LedgerError::Abi(format!("bad type {t:?}: {e}"))))
        .collect()
}

// ---------------------------------------------------------------------------
// ContractMethod
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ContractMethod {
    name: String,
    inputs: Vec<DynSolType>,
    outputs: Vec<DynSolType>,
    mutability: Mutability,
}

impl ContractMethod {
    pub fn new(
        name: &str,
        inputs: &[&str],
        outputs: &[&str],
        mutability: Mutability,
    ) -> Result<Self, LedgerError> {
        Ok(Self {
            name: name.to_string(),
            inputs: parse_types(inputs)?,
            outputs: parse_types(outputs)?,
            mutability,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[DynSolType] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[DynSolType] {
        &self.outputs
    }

    pub fn mutability(&self) -> Mutability {
        self.mutability
    }

    /// Canonical signature, e.g. `transfer(address,uint256)`.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .inputs
            .iter()
            .map(|t| t.sol_type_name().into_owned())
            .collect();
        format!("{}({})", self.name, params.join(","))
    }

    /// First four bytes of the keccak-256 hash of [`Self::signature`].
    pub fn selector(&self) -> [u8; 4] {
        let hash = keccak256(self.signature().as_bytes());
        [hash[0], hash[1], hash[2], hash[3]]
    }

    /// Selector followed by the ABI-encoded arguments.
    pub fn encode_call(&self, args: &[DynSolValue]) -> Result<Bytes, LedgerError> {
        check_args(&self.signature(), &self.inputs, args)?;

        let mut data = self.selector().to_vec();
        data.extend(DynSolValue::Tuple(args.to_vec()).abi_encode_params());
        Ok(data.into())
    }

    /// Decode return data into one value per declared output.
    pub fn decode_output(&self, data: &[u8]) -> Result<Vec<DynSolValue>, LedgerError> {
        if self.outputs.is_empty() {
            return Ok(Vec::new());
        }
        if data.is_empty() {
            return Err(LedgerError::Abi(format!(
                "{} returned no data; is the contract deployed on this chain?",
                self.name
            )));
        }

        let decoded = DynSolType::Tuple(self.outputs.clone())
            .abi_decode_params(data)
            .map_err(|e| LedgerError::Abi(format!("cannot decode {} output: {e}", self.name)))?;

        match decoded {
            DynSolValue::Tuple(values) => Ok(values),
            other => Ok(vec![other]),
        }
    }
}

fn check_args(signature: &str, inputs: &[DynSolType], args: &[DynSolValue]) -> Result<(), LedgerError> {
    if args.len() != inputs.len() {
        return Err(LedgerError::Abi(format!(
            "{signature} expects {} argument(s), got {}",
            inputs.len(),
            args.len()
        )));
    }
    for (i, (ty, value)) in inputs.iter().zip(args).enumerate() {
        if !ty.matches(value) {
            return Err(LedgerError::Abi(format!(
                "argument #{} of {signature} is not a {}",
                i + 1,
                ty.sol_type_name()
            )));
        }
    }
    Ok(())
}

/// ABI-encode constructor arguments, to be appended to creation bytecode.
pub fn encode_constructor_args(types: &[&str], args: &[DynSolValue]) -> Result<Bytes, LedgerError> {
    let inputs = parse_types(types)?;
    check_args("constructor", &inputs, args)?;
    Ok(DynSolValue::Tuple(args.to_vec()).abi_encode_params().into())
}

// ---------------------------------------------------------------------------
// Contract / ContractCall
// ---------------------------------------------------------------------------

/// A deployed contract and the methods this client knows about.
#[derive(Debug, Clone)]
pub struct Contract {
    address: Address,
    methods: HashMap<String, ContractMethod>,
}

impl Contract {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            methods: HashMap::new(),
        }
    }

    pub fn with_method(mut self, method: ContractMethod) -> Self {
        self.methods.insert(method.name.clone(), method);
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn method(&self, name: &str) -> Result<&ContractMethod, LedgerError> {
        self.methods
            .get(name)
            .ok_or_else(|| LedgerError::Abi(format!("unknown method {name}")))
    }

    /// Calldata for `name(args..)`.
    pub fn encode(&self, name: &str, args: &[DynSolValue]) -> Result<Bytes, LedgerError> {
        self.method(name)?.encode_call(args)
    }

    /// Bind `name` and `args` into a call. Arguments are checked here so a
    /// bad call is rejected before any adapter state changes.
    pub fn call(&self, name: &str, args: Vec<DynSolValue>) -> Result<ContractCall, LedgerError> {
        let method = self.method(name)?.clone();
        check_args(&method.signature(), &method.inputs, &args)?;
        Ok(ContractCall {
            to: self.address,
            method,
            args,
        })
    }
}

/// One method invocation against one contract.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractCall {
    pub to: Address,
    pub method: ContractMethod,
    pub args: Vec<DynSolValue>,
}

impl ContractCall {
    pub fn calldata(&self) -> Result<Bytes, LedgerError> {
        self.method.encode_call(&self.args)
    }

    /// Same method, different arguments.
    pub fn with_args(&self, args: Vec<DynSolValue>) -> Result<Self, LedgerError> {
        check_args(&self.method.signature(), &self.method.inputs, &args)?;
        Ok(Self {
            to: self.to,
            method: self.method.clone(),
            args,
        })
    }

    pub fn to_request(&self, from: Option<Address>) -> Result<TransactionRequest, LedgerError> {
        Ok(TransactionRequest {
            from,
            to: Some(self.to),
            data: self.calldata()?,
            ..Default::default()
        })
    }

    /// Execute via `eth_call` and decode the outputs.
    pub async fn read(&self, client: &LedgerClient) -> Result<Vec<DynSolValue>, LedgerError> {
        let data = client.call(self.to, self.calldata()?).await?;
        self.method.decode_output(&data)
    }
}

// ---------------------------------------------------------------------------
// Decoded value conversion
// ---------------------------------------------------------------------------

/// Conversion from a decoded ABI value into a Rust type.
pub trait FromDynValue: Sized {
    fn from_dyn(value: &DynSolValue) -> Result<Self, LedgerError>;
}

fn mismatch(expected: &str, value: &DynSolValue) -> LedgerError {
    LedgerError::Decode(format!("expected {expected}, got {value:?}"))
}

impl FromDynValue for U256 {
    fn from_dyn(value: &DynSolValue) -> Result<Self, LedgerError> {
        match value {
            DynSolValue::Uint(v, _) => Ok(*v),
            other => Err(mismatch("uint", other)),
        }
    }
}

impl FromDynValue for u64 {
    fn from_dyn(value: &DynSolValue) -> Result<Self, LedgerError> {
        let v = U256::from_dyn(value)?;
        if v > U256::from(u64::MAX) {
            return Err(LedgerError::Decode(format!("{v} does not fit in u64")));
        }
        Ok(v.to::<u64>())
    }
}

impl FromDynValue for u8 {
    fn from_dyn(value: &DynSolValue) -> Result<Self, LedgerError> {
        let v = U256::from_dyn(value)?;
        if v > U256::from(u8::MAX) {
            return Err(LedgerError::Decode(format!("{v} does not fit in u8")));
        }
        Ok(v.to::<u8>())
    }
}

impl FromDynValue for String {
    fn from_dyn(value: &DynSolValue) -> Result<Self, LedgerError> {
        match value {
            DynSolValue::String(s) => Ok(s.clone()),
            other => Err(mismatch("string", other)),
        }
    }
}

impl FromDynValue for Address {
    fn from_dyn(value: &DynSolValue) -> Result<Self, LedgerError> {
        match value {
            DynSolValue::Address(a) => Ok(*a),
            other => Err(mismatch("address", other)),
        }
    }
}

impl FromDynValue for bool {
    fn from_dyn(value: &DynSolValue) -> Result<Self, LedgerError> {
        match value {
            DynSolValue::Bool(b) => Ok(*b),
            other => Err(mismatch("bool", other)),
        }
    }
}

/// Convert the first decoded output of a single-result method.
pub fn first_output<T: FromDynValue>(values: &[DynSolValue]) -> Result<T, LedgerError> {
    let value = values
        .first()
        .ok_or_else(|| LedgerError::Decode("method returned no values".into()))?;
    T::from_dyn(value)
}

// ---------------------------------------------------------------------------
// Bills of Exchange ABI
// ---------------------------------------------------------------------------

type MethodEntry = (&'static str, &'static [&'static str], &'static [&'static str], Mutability);

const BILLS_OF_EXCHANGE_METHODS: &[MethodEntry] = &[
    ("name", &[], &["string"], Mutability::View),
    ("symbol", &[], &["string"], Mutability::View),
    ("decimals", &[], &["uint8"], Mutability::View),
    ("totalSupply", &[], &["uint256"], Mutability::View),
    ("balanceOf", &["address"], &["uint256"], Mutability::View),
    ("description", &[], &["string"], Mutability::View),
    ("drawer", &[], &["string"], Mutability::View),
    ("drawerEthereumAddress", &[], &["address"], Mutability::View),
    ("drawee", &[], &["string"], Mutability::View),
    ("draweeEthereumAddress", &[], &["address"], Mutability::View),
    ("currency", &[], &["string"], Mutability::View),
    ("sumToBePaidForEveryToken", &[], &["uint256"], Mutability::View),
    ("timeOfPayment", &[], &["string"], Mutability::View),
    ("placeWhereTheBillIsIssued", &[], &["string"], Mutability::View),
    ("placeWherePaymentIsToBeMade", &[], &["string"], Mutability::View),
    ("issuedOnUnixTime", &[], &["uint256"], Mutability::View),
    ("acceptedOnUnixTime", &[], &["uint256"], Mutability::View),
    ("owner", &[], &["address"], Mutability::View),
    ("transfer", &["address", "uint256"], &["bool"], Mutability::Nonpayable),
    ("accept", &[], &["bool"], Mutability::Nonpayable),
];

/// Constructor parameter types of the Bills of Exchange contract.
pub const BILLS_OF_EXCHANGE_CONSTRUCTOR: &[&str] = &["address"];

/// The Bills of Exchange token at `address`.
pub fn bills_of_exchange(address: Address) -> Result<Contract, LedgerError> {
    BILLS_OF_EXCHANGE_METHODS
        .iter()
        .try_fold(Contract::new(address), |contract, (name, inputs, outputs, mutability)| {
            Ok(contract.with_method(ContractMethod::new(name, inputs, outputs, *mutability)?))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boe() -> Contract {
        bills_of_exchange(Address::repeat_byte(0x42)).unwrap()
    }

    #[test]
    fn well_known_selectors() {
        let c = boe();
        assert_eq!(c.method("transfer").unwrap().selector(), [0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(c.method("balanceOf").unwrap().selector(), [0x70, 0xa0, 0x82, 0x31]);
        assert_eq!(c.method("totalSupply").unwrap().selector(), [0x18, 0x16, 0x0d, 0xdd]);
        assert_eq!(c.method("transfer").unwrap().signature(), "transfer(address,uint256)");
    }

    #[test]
    fn encode_transfer_call() {
        let to = Address::repeat_byte(0x11);
        let data = boe()
            .encode("transfer", &[DynSolValue::Address(to), DynSolValue::Uint(U256::from(5), 256)])
            .unwrap();

        assert_eq!(data.len(), 4 + 32 + 32);
        assert_eq!(&data[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(&data[16..36], to.as_slice());
        assert_eq!(data[67], 5);
    }

    #[test]
    fn arity_and_type_are_checked() {
        let c = boe();
        let err = c.encode("balanceOf", &[]).unwrap_err();
        assert!(err.to_string().contains("expects 1 argument"), "{err}");

        let err = c
            .call("balanceOf", vec![DynSolValue::Bool(true)])
            .unwrap_err();
        assert!(err.to_string().contains("not a address"), "{err}");

        assert!(c.method("mint").is_err());
    }

    #[test]
    fn decode_uint_and_string_outputs() {
        let c = boe();
        let encoded = DynSolValue::Tuple(vec![DynSolValue::Uint(U256::from(42), 256)]).abi_encode_params();
        let values = c.method("totalSupply").unwrap().decode_output(&encoded).unwrap();
        assert_eq!(first_output::<U256>(&values).unwrap(), U256::from(42));

        let encoded =
            DynSolValue::Tuple(vec![DynSolValue::String("Bill No. 1".into())]).abi_encode_params();
        let values = c.method("description").unwrap().decode_output(&encoded).unwrap();
        assert_eq!(first_output::<String>(&values).unwrap(), "Bill No. 1");
    }

    #[test]
    fn empty_return_data_means_no_contract() {
        let err = boe().method("name").unwrap().decode_output(&[]).unwrap_err();
        assert!(err.to_string().contains("deployed"), "{err}");
    }

    #[test]
    fn from_dyn_value_conversions() {
        assert_eq!(u8::from_dyn(&DynSolValue::Uint(U256::from(18), 8)).unwrap(), 18);
        assert!(u8::from_dyn(&DynSolValue::Uint(U256::from(300), 256)).is_err());
        assert!(String::from_dyn(&DynSolValue::Bool(true)).is_err());
        assert!(bool::from_dyn(&DynSolValue::Bool(true)).unwrap());
    }

    #[test]
    fn constructor_args_are_plain_abi_words() {
        let owner = Address::repeat_byte(0xaa);
        let encoded =
            encode_constructor_args(BILLS_OF_EXCHANGE_CONSTRUCTOR, &[DynSolValue::Address(owner)]).unwrap();
        assert_eq!(encoded.len(), 32);
        assert_eq!(&encoded[12..], owner.as_slice());

        assert!(encode_constructor_args(BILLS_OF_EXCHANGE_CONSTRUCTOR, &[]).is_err());
    }

    #[test]
    fn mutability_classification() {
        let c = boe();
        assert!(c.method("balanceOf").unwrap().mutability().is_read_only());
        assert!(!c.method("transfer").unwrap().mutability().is_read_only());
    }
}

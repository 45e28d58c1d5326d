// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The remote bridge (C9): sending a call across a byte-stream transport and dispatching an
//! inbound stream back to a locally registered callable.
//!
//! The wire format is a flat, NUL-byte-delimited frame: a decimal-ASCII [`DelegateId`], a NUL
//! separator, then the encoded arguments, themselves NUL-separated field by field. Every built-in
//! [`RemoteEncode`] impl for an integer type writes decimal ASCII rather than raw binary for
//! exactly this reason - a binary `u32` can and will contain a literal `0x00` byte, which would
//! be indistinguishable from a frame separator. `String` is the one built-in type that can still
//! break this scheme (an embedded NUL in the string payload truncates the frame); see `DESIGN.md`.

use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use std::collections::HashMap;

use crate::callable::{Callable, Identity, Target};
use crate::error::{Error, Result};

/// A process-wide (or, over a real transport, cluster-wide) identifier for a remote receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DelegateId(pub u32);

impl fmt::Display for DelegateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A byte-stream sink a [`DelegateId`]-addressed call is sent over.
///
/// Implement this against a socket, a message queue, or (for tests) a loopback that calls
/// [`dispatch`] directly.
pub trait Transport: Send + Sync {
    /// Sends a fully-framed stream (see the module docs for the wire format).
    ///
    /// # Errors
    ///
    /// Implementations should return [`Error::DispatchRejected`] (or another appropriate
    /// variant) if the stream could not be sent.
    fn send(&self, stream: &[u8]) -> Result<()>;
}

/// Encodes a single argument value into its wire representation.
pub trait RemoteEncode {
    /// Returns the wire-format bytes for this value.
    fn remote_encode(&self) -> Vec<u8>;
}

/// Decodes a single argument value from its wire representation.
pub trait RemoteDecode: Sized {
    /// Parses `bytes` back into a value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemoteDecode`] if `bytes` is not a valid encoding of `Self`.
    fn remote_decode(bytes: &[u8]) -> Result<Self>;
}

macro_rules! impl_integer_codec {
    ($($t:ty),* $(,)?) => {
        $(
            impl RemoteEncode for $t {
                fn remote_encode(&self) -> Vec<u8> {
                    self.to_string().into_bytes()
                }
            }

            impl RemoteDecode for $t {
                fn remote_decode(bytes: &[u8]) -> Result<Self> {
                    std::str::from_utf8(bytes)
                        .map_err(|e| Error::RemoteDecode(e.to_string()))?
                        .parse::<$t>()
                        .map_err(|e| Error::RemoteDecode(e.to_string()))
                }
            }
        )*
    };
}

impl_integer_codec!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

impl RemoteEncode for bool {
    fn remote_encode(&self) -> Vec<u8> {
        if *self { b"1".to_vec() } else { b"0".to_vec() }
    }
}

impl RemoteDecode for bool {
    fn remote_decode(bytes: &[u8]) -> Result<Self> {
        match bytes {
            b"0" => Ok(false),
            b"1" => Ok(true),
            _ => Err(Error::RemoteDecode("expected \"0\" or \"1\" for a bool".to_owned())),
        }
    }
}

impl RemoteEncode for String {
    fn remote_encode(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

impl RemoteDecode for String {
    fn remote_decode(bytes: &[u8]) -> Result<Self> {
        String::from_utf8(bytes.to_vec()).map_err(|e| Error::RemoteDecode(e.to_string()))
    }
}

fn join_fields(fields: Vec<Vec<u8>>) -> Vec<u8> {
    let mut out = Vec::new();
    for (index, field) in fields.into_iter().enumerate() {
        if index > 0 {
            out.push(0);
        }
        out.extend_from_slice(&field);
    }
    out
}

fn split_fields(bytes: &[u8], count: usize) -> Result<Vec<&[u8]>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let fields: Vec<&[u8]> = bytes.splitn(count, |&b| b == 0).collect();
    if fields.len() != count {
        return Err(Error::RemoteDecode(format!(
            "expected {count} NUL-delimited fields, found {}",
            fields.len()
        )));
    }
    Ok(fields)
}

pub(crate) fn encode_id(id: DelegateId, payload: &[u8]) -> Vec<u8> {
    let mut out = id.0.to_string().into_bytes();
    out.push(0);
    out.extend_from_slice(payload);
    out
}

pub(crate) fn decode_id(stream: &[u8]) -> Result<(DelegateId, &[u8])> {
    let separator = stream
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| Error::RemoteDecode("missing id separator".to_owned()))?;
    let (id_bytes, rest) = stream.split_at(separator);
    let id_str = std::str::from_utf8(id_bytes).map_err(|e| Error::RemoteDecode(e.to_string()))?;
    let id = id_str.parse::<u32>().map_err(|e| Error::RemoteDecode(e.to_string()))?;
    Ok((DelegateId(id), &rest[1..]))
}

/// Encodes an entire argument tuple to its wire representation.
pub trait EncodeArgs {
    /// Returns the NUL-delimited wire-format bytes for this argument tuple.
    fn encode_args(&self) -> Vec<u8>;
}

/// Decodes an entire argument tuple from its wire representation.
pub trait DecodeArgs: Sized {
    /// Parses `bytes` back into an argument tuple.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemoteDecode`] if `bytes` does not decode to `Self`.
    fn decode_args(bytes: &[u8]) -> Result<Self>;
}

impl EncodeArgs for () {
    fn encode_args(&self) -> Vec<u8> {
        Vec::new()
    }
}

impl DecodeArgs for () {
    fn decode_args(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            Ok(())
        } else {
            Err(Error::RemoteDecode("expected zero fields".to_owned()))
        }
    }
}

macro_rules! impl_args_codec {
    ($count:expr; $($idx:tt => $t:ident),+ $(,)?) => {
        impl<$($t: RemoteEncode),+> EncodeArgs for ($($t,)+) {
            fn encode_args(&self) -> Vec<u8> {
                join_fields(vec![$(self.$idx.remote_encode()),+])
            }
        }

        impl<$($t: RemoteDecode),+> DecodeArgs for ($($t,)+) {
            fn decode_args(bytes: &[u8]) -> Result<Self> {
                let fields = split_fields(bytes, $count)?;
                let mut fields = fields.into_iter();
                Ok(($(
                    $t::remote_decode(
                        fields.next().expect("split_fields already checked the field count")
                    )?,
                )+))
            }
        }
    };
}

impl_args_codec!(1; 0 => A1);
impl_args_codec!(2; 0 => A1, 1 => A2);
impl_args_codec!(3; 0 => A1, 1 => A2, 2 => A3);
impl_args_codec!(4; 0 => A1, 1 => A2, 2 => A3, 3 => A4);
impl_args_codec!(5; 0 => A1, 1 => A2, 2 => A3, 3 => A4, 4 => A5);
impl_args_codec!(6; 0 => A1, 1 => A2, 2 => A3, 3 => A4, 4 => A5, 5 => A6);
impl_args_codec!(7; 0 => A1, 1 => A2, 2 => A3, 3 => A4, 4 => A5, 5 => A6, 6 => A7);
impl_args_codec!(8; 0 => A1, 1 => A2, 2 => A3, 3 => A4, 4 => A5, 5 => A6, 6 => A7, 7 => A8);

struct RemoteSenderTarget<Args> {
    id: DelegateId,
    transport: Arc<dyn Transport>,
    _marker: PhantomData<fn(Args)>,
}

impl<Args> Target<Args, ()> for RemoteSenderTarget<Args>
where
    Args: EncodeArgs + Send + 'static,
{
    fn call(&self, args: Args) -> Result<()> {
        let stream = encode_id(self.id, &args.encode_args());
        self.transport.send(&stream)
    }

    fn clone_boxed(&self) -> Box<dyn Target<Args, ()>> {
        Box::new(Self { id: self.id, transport: Arc::clone(&self.transport), _marker: PhantomData })
    }

    fn identity(&self) -> Identity {
        Identity::Remote(self.id.0)
    }
}

/// Builds a [`Callable`] that, when invoked, encodes its arguments and sends them to `id` over
/// `transport` instead of running anything locally.
///
/// The returned callable never fails on its own account; errors surface only if `transport`
/// itself rejects the send.
#[must_use]
pub fn remote_sender<Args>(id: DelegateId, transport: Arc<dyn Transport>) -> Callable<Args, ()>
where
    Args: EncodeArgs + Send + 'static,
{
    Callable::from_target(Box::new(RemoteSenderTarget { id, transport, _marker: PhantomData }))
}

type Handler = Box<dyn Fn(&[u8]) -> Result<()> + Send + Sync>;

static REGISTRY: OnceLock<Mutex<HashMap<DelegateId, Handler>>> = OnceLock::new();

fn registry() -> &'static Mutex<HashMap<DelegateId, Handler>> {
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// A registration that routes an inbound stream addressed to `id` to a local [`Callable`].
///
/// Unregisters itself on drop, so a receiver's `id` becomes available again once it goes out of
/// scope.
pub struct RemoteReceiver {
    id: DelegateId,
}

impl RemoteReceiver {
    /// Registers `target` to receive streams addressed to `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateRemoteId`] if `id` is already registered.
    pub fn register<Args, Ret>(id: DelegateId, target: Callable<Args, Ret>) -> Result<Self>
    where
        Args: DecodeArgs + 'static,
        Ret: 'static,
    {
        let handler: Handler = Box::new(move |payload: &[u8]| {
            let args = Args::decode_args(payload)?;
            target.invoke(args).map(|_| ())
        });

        let mut guard = registry().lock().unwrap_or_else(PoisonError::into_inner);
        if guard.contains_key(&id) {
            return Err(Error::DuplicateRemoteId(id));
        }
        guard.insert(id, handler);
        drop(guard);

        Ok(Self { id })
    }

    /// The id this receiver is registered under.
    #[must_use]
    pub fn id(&self) -> DelegateId {
        self.id
    }
}

impl Drop for RemoteReceiver {
    fn drop(&mut self) {
        registry().lock().unwrap_or_else(PoisonError::into_inner).remove(&self.id);
    }
}

/// Routes an inbound, fully-framed stream to whatever [`RemoteReceiver`] is registered for the
/// id it names.
///
/// # Errors
///
/// Returns [`Error::RemoteDecode`] if `stream` is not validly framed, or
/// [`Error::NoSuchRemoteTarget`] if no receiver is registered for the decoded id. Any error the
/// target itself returns (for instance [`Error::Empty`]) propagates unchanged.
pub fn dispatch(stream: &[u8]) -> Result<()> {
    let (id, payload) = decode_id(stream)?;
    let guard = registry().lock().unwrap_or_else(PoisonError::into_inner);
    match guard.get(&id) {
        Some(handler) => handler(payload),
        None => {
            tracing::warn!(?id, "inbound stream named an unregistered remote id");
            Err(Error::NoSuchRemoteTarget(id))
        }
    }
}

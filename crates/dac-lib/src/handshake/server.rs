//! Server transition functions.

use super::{AuthStage, HandshakeContext};
use dac_protocol::wire::{expect_len, TransportFields};
use dac_protocol::{
    AuthFailure, ClientAuth, ClientHello, CryptoError, DacError, ProtocolError, Result,
    ServerFinished, ServerHello, Transport, PROTOCOL_VERSION,
};
use log::warn;

pub(super) fn step<T: Transport + ?Sized>(
    ctx: &mut HandshakeContext,
    transport: &mut T,
) -> Result<AuthStage> {
    match ctx.stage {
        AuthStage::Init => init(ctx),
        AuthStage::Compute => compute(ctx, transport),
        AuthStage::Verify => verify(ctx, transport),
        AuthStage::Finish => finish(ctx, transport),
        stage => Err(DacError::InvalidState(format!(
            "server handshake cannot run stage {:?}",
            stage
        ))),
    }
}

/// Identity key and server nonce
fn init(ctx: &mut HandshakeContext) -> Result<AuthStage> {
    let identity = ctx.load_identity()?;
    ctx.server_identity = identity.public_key();
    ctx.server_nonce = ctx.take_nonce();
    Ok(AuthStage::Compute)
}

/// Read `params ‖ e ‖ Vc`, compute `K` and `H`, send `f ‖ s ‖ Ks ‖ Vs`
fn compute<T: Transport + ?Sized>(
    ctx: &mut HandshakeContext,
    transport: &mut T,
) -> Result<AuthStage> {
    let hello = ClientHello::decode(&mut TransportFields::new(transport))?;
    if hello.version != PROTOCOL_VERSION {
        return Err(ProtocolError::InvalidVersion {
            expected: PROTOCOL_VERSION,
            got: hello.version,
        }
        .into());
    }
    if hello.suite != ctx.suite.id().to_u8() {
        return Err(CryptoError::UnsupportedSuite(hello.suite).into());
    }
    expect_len(&hello.ephemeral, ctx.suite.ephemeral_len())?;

    ctx.client_ephemeral = hello.ephemeral;
    ctx.client_nonce = hello.nonce;

    let ephemeral = ctx.suite.generate_ephemeral()?;
    ctx.server_ephemeral = ephemeral.public_key();
    ctx.ephemeral = Some(ephemeral);

    let peer_ephemeral = ctx.client_ephemeral.clone();
    ctx.agree(&peer_ephemeral)?;

    *ctx.h = ctx.server_transcript();
    let signature = ctx.identity()?.sign(&ctx.h[..])?;

    let reply = ServerHello {
        ephemeral: ctx.server_ephemeral.clone(),
        signature,
        identity: ctx.server_identity.clone(),
        nonce: ctx.server_nonce,
    };
    transport.send_all(&reply.to_bytes()?)?;
    Ok(AuthStage::Verify)
}

/// Read `Kc ‖ sc`, check the client against the verifier and `Hc`
fn verify<T: Transport + ?Sized>(
    ctx: &mut HandshakeContext,
    transport: &mut T,
) -> Result<AuthStage> {
    let auth = ClientAuth::decode(&mut TransportFields::new(transport))?;
    expect_len(&auth.identity, ctx.suite.identity_len())?;
    expect_len(&auth.signature, ctx.suite.signature_len())?;

    ctx.client_identity = auth.identity;
    ctx.peer_signature = auth.signature;

    if !ctx.verifier.is_trusted(&ctx.client_identity) {
        warn!("Client identity rejected by verifier");
        return Err(AuthFailure::PeerRejected.into());
    }

    *ctx.hc = ctx.client_transcript();
    ctx.suite
        .verify(&ctx.client_identity, &ctx.hc[..], &ctx.peer_signature)?;
    Ok(AuthStage::Finish)
}

/// Derive keys and send the key confirmation
fn finish<T: Transport + ?Sized>(
    ctx: &mut HandshakeContext,
    transport: &mut T,
) -> Result<AuthStage> {
    let confirm = ctx.derive_schedule()?;

    transport.send_all(&ServerFinished { confirm }.to_bytes()?)?;
    Ok(AuthStage::Done)
}

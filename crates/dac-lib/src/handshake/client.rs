//! Client transition functions.

use super::{AuthStage, HandshakeContext};
use dac_core::crypto::constant_time_compare;
use dac_protocol::wire::{expect_len, TransportFields};
use dac_protocol::{
    AuthFailure, ClientAuth, ClientHello, Result, ServerFinished, ServerHello, Transport,
};
use log::warn;

pub(super) fn step<T: Transport + ?Sized>(
    ctx: &mut HandshakeContext,
    transport: &mut T,
) -> Result<AuthStage> {
    match ctx.stage {
        AuthStage::Init => init(ctx),
        AuthStage::Generate => generate(ctx, transport),
        AuthStage::Verify => verify(ctx, transport),
        AuthStage::Finish => finish(ctx, transport),
        stage => Err(dac_protocol::DacError::InvalidState(format!(
            "client handshake cannot run stage {:?}",
            stage
        ))),
    }
}

/// Identity key and client nonce
fn init(ctx: &mut HandshakeContext) -> Result<AuthStage> {
    let identity = ctx.load_identity()?;
    ctx.client_identity = identity.public_key();
    ctx.client_nonce = ctx.take_nonce();
    Ok(AuthStage::Generate)
}

/// Send `params ‖ e ‖ Vc`, read `f ‖ s ‖ Ks ‖ Vs`, compute `K`
fn generate<T: Transport + ?Sized>(
    ctx: &mut HandshakeContext,
    transport: &mut T,
) -> Result<AuthStage> {
    let ephemeral = ctx.suite.generate_ephemeral()?;
    ctx.client_ephemeral = ephemeral.public_key();
    ctx.ephemeral = Some(ephemeral);

    let hello = ClientHello::new(
        ctx.suite.id().to_u8(),
        ctx.client_ephemeral.clone(),
        ctx.client_nonce,
    );
    transport.send_all(&hello.to_bytes()?)?;

    let reply = ServerHello::decode(&mut TransportFields::new(transport))?;
    expect_len(&reply.ephemeral, ctx.suite.ephemeral_len())?;
    expect_len(&reply.signature, ctx.suite.signature_len())?;
    expect_len(&reply.identity, ctx.suite.identity_len())?;

    ctx.server_ephemeral = reply.ephemeral;
    ctx.peer_signature = reply.signature;
    ctx.server_identity = reply.identity;
    ctx.server_nonce = reply.nonce;

    let peer_ephemeral = ctx.server_ephemeral.clone();
    ctx.agree(&peer_ephemeral)?;
    Ok(AuthStage::Verify)
}

/// Check the server, then sign `Hc` and send `Kc ‖ sc`
fn verify<T: Transport + ?Sized>(
    ctx: &mut HandshakeContext,
    transport: &mut T,
) -> Result<AuthStage> {
    if !ctx.verifier.is_trusted(&ctx.server_identity) {
        warn!("Server identity rejected by verifier");
        return Err(AuthFailure::PeerRejected.into());
    }

    *ctx.h = ctx.server_transcript();
    ctx.suite
        .verify(&ctx.server_identity, &ctx.h[..], &ctx.peer_signature)?;

    *ctx.hc = ctx.client_transcript();
    let signature = ctx.identity()?.sign(&ctx.hc[..])?;

    let auth = ClientAuth {
        identity: ctx.client_identity.clone(),
        signature,
    };
    transport.send_all(&auth.to_bytes()?)?;
    Ok(AuthStage::Finish)
}

/// Derive keys and check the server's key confirmation
fn finish<T: Transport + ?Sized>(
    ctx: &mut HandshakeContext,
    transport: &mut T,
) -> Result<AuthStage> {
    let expected = ctx.derive_schedule()?;

    let finished = ServerFinished::decode(&mut TransportFields::new(transport))?;
    if !constant_time_compare(&finished.confirm, &expected) {
        return Err(AuthFailure::KeyConfirmation.into());
    }
    Ok(AuthStage::Done)
}

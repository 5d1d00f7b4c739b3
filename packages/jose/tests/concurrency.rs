//! Shared registry, policy and keys across threads

mod common;

use common::*;
use cryypt_jose::{
    AlgorithmBinding, ClaimOptions, KeySet, SecurityPolicy, SignerBinding, TokenBuilder,
    TokenDecoder,
};
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn tasks_share_one_decoder() {
    init_tracing();
    let key = octet("key_id", b"shared secret");
    let set = Arc::new(KeySet::new([key.as_ref().clone(), (*p256_private("ec")).clone()]).unwrap());
    let policy = Arc::new(SecurityPolicy::default());
    let builder = Arc::new(
        TokenBuilder::new()
            .clock(clock())
            .bind(SignerBinding::new("HS256", key)),
    );
    let decoder = Arc::new(TokenDecoder::new().clock(clock()));

    let handles: Vec<_> = (0..32)
        .map(|i| {
            let (set, policy, builder, decoder) = (
                Arc::clone(&set),
                Arc::clone(&policy),
                Arc::clone(&builder),
                Arc::clone(&decoder),
            );
            tokio::spawn(async move {
                let claims = ClaimOptions::new().jti(i.to_string()).expires_at(NOW + 60);
                let token = builder.build(&claims, &policy).into_result().unwrap();
                let decoded = decoder
                    .decode(&token, &AlgorithmBinding::signature("HS256"), set.as_ref(), &policy)
                    .into_result()
                    .unwrap();
                decoded.into_claims().jti
            })
        })
        .collect();

    let mut seen = Vec::new();
    for handle in handles {
        seen.push(handle.await.unwrap().unwrap());
    }
    seen.sort_by_key(|jti| jti.parse::<u32>().unwrap());
    assert_eq!(seen, (0..32).map(|i| i.to_string()).collect::<Vec<_>>());
}

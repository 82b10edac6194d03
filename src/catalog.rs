//! Fixed registry of the transaction shapes a learner can request.
//!
//! A variant's labels and its build policy are independent fields. The
//! builder reads only the policy, which is what lets a card advertise one
//! thing while the transaction does another.

use serde::Serialize;

use crate::error::BuildError;

pub const LOVELACE_PER_ADA: u64 = 1_000_000;

pub const MINT_ASSET_NAME: &str = "MarlowePBLToken";

const COFFEE_RECIPIENT: &str = "addr_test1qq9arvmq2z2kq0u3l8rm3vtnuatg6lm2qlclgxlx53rdrhs8mq3lv077rc4unwmnpqsmdw9qvq4ekl2wte88elzp4ptqmfs9dr";

const CONTRIBUTORS: [&str; 3] = [
    "addr_test1qp43lca8a458jp8trhh8ne4ghgwucrk43segawr6wqfp2mfupw667k0qg82c8l472nmeqtmn8lwcpmux8csr6jp9j4xsxh3mq2",
    "addr_test1qpxdq6pskv3qt4xumfjfqhrld2drlcv7yj554ap6aufz06a6jtmyf6278df53zuljuwrd6drdv250kjm6wxf82a4mkqsckja3g",
    "addr_test1qz8ef8xraq7yk4l7c4xwkeh83fy06gwp26y94hp6k5skyduna85k9xqre75hrmdrge9r2gd4kh5rzqwu609ulzxamqcqc0jhd3",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recipient {
    /// The caller's own change address.
    ChangeAddress,
    Literal(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FixedOutput {
    pub recipient: Recipient,
    pub lovelace: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum BuildPolicy {
    FixedOutputSet { outputs: &'static [FixedOutput] },
    /// One output whose recipient and amount come from the request.
    UserSpecifiedOutput,
    /// Mint one unit under a single-signature policy of the change address and
    /// deliver it back with `delivery_lovelace`.
    MintAndDeliver {
        asset_name: &'static str,
        delivery_lovelace: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantDefinition {
    pub id: &'static str,
    pub requires_user_inputs: bool,
    pub button_label: &'static str,
    pub display_label: &'static str,
    pub display_description: &'static str,
    /// Lovelace the card tells the learner will leave or move, when it names
    /// an amount at all.
    pub advertised_lovelace: Option<u64>,
    pub build_policy: BuildPolicy,
}

static CATALOG: [VariantDefinition; 5] = [
    VariantDefinition {
        id: "1013example",
        requires_user_inputs: true,
        button_label: "Send",
        display_label: "Send ADA",
        display_description: "Send ADA to any address",
        advertised_lovelace: None,
        build_policy: BuildPolicy::UserSpecifiedOutput,
    },
    VariantDefinition {
        id: "1013a",
        requires_user_inputs: false,
        button_label: "Split UTxOs",
        display_label: "Split UTxOs",
        display_description: "Create 3 UTxOs of 5 ADA each (sent to yourself)",
        advertised_lovelace: Some(15 * LOVELACE_PER_ADA),
        build_policy: BuildPolicy::FixedOutputSet {
            outputs: &[
                FixedOutput {
                    recipient: Recipient::ChangeAddress,
                    lovelace: 5 * LOVELACE_PER_ADA,
                },
                FixedOutput {
                    recipient: Recipient::ChangeAddress,
                    lovelace: 5 * LOVELACE_PER_ADA,
                },
                FixedOutput {
                    recipient: Recipient::ChangeAddress,
                    lovelace: 5 * LOVELACE_PER_ADA,
                },
            ],
        },
    },
    VariantDefinition {
        id: "1013b",
        requires_user_inputs: false,
        button_label: "Mint Token",
        display_label: "Mint Token",
        display_description: "Mint a MarlowePBLToken to your wallet",
        advertised_lovelace: None,
        build_policy: BuildPolicy::MintAndDeliver {
            asset_name: MINT_ASSET_NAME,
            delivery_lovelace: 2 * LOVELACE_PER_ADA,
        },
    },
    VariantDefinition {
        id: "1013c",
        requires_user_inputs: false,
        button_label: "Donate 5 ADA",
        display_label: "Donate 5 ADA",
        display_description: "Donate 5 ADA to buy a cup of coffee for the course creators",
        advertised_lovelace: Some(5 * LOVELACE_PER_ADA),
        build_policy: BuildPolicy::FixedOutputSet {
            outputs: &[FixedOutput {
                recipient: Recipient::Literal(COFFEE_RECIPIENT),
                lovelace: 500 * LOVELACE_PER_ADA,
            }],
        },
    },
    VariantDefinition {
        id: "1013d",
        requires_user_inputs: false,
        button_label: "Donate 36 ADA",
        display_label: "Donate 36 ADA",
        display_description: "Donate 12 ADA each to 3 course contributors",
        advertised_lovelace: Some(36 * LOVELACE_PER_ADA),
        build_policy: BuildPolicy::FixedOutputSet {
            outputs: &[
                FixedOutput {
                    recipient: Recipient::Literal(CONTRIBUTORS[0]),
                    lovelace: 12 * LOVELACE_PER_ADA,
                },
                FixedOutput {
                    recipient: Recipient::Literal(CONTRIBUTORS[1]),
                    lovelace: 12 * LOVELACE_PER_ADA,
                },
                FixedOutput {
                    recipient: Recipient::Literal(CONTRIBUTORS[2]),
                    lovelace: 12 * LOVELACE_PER_ADA,
                },
            ],
        },
    },
];

pub fn all() -> &'static [VariantDefinition] {
    &CATALOG
}

pub fn resolve(variant_id: &str) -> Result<&'static VariantDefinition, BuildError> {
    CATALOG
        .iter()
        .find(|v| v.id == variant_id)
        .ok_or_else(|| BuildError::UnknownVariant(variant_id.to_string()))
}

/// Lovelace rendered in ADA with six decimals, the way the send form echoes
/// the typed amount.
pub fn format_ada(lovelace: u64) -> String {
    format!(
        "{}.{:06}",
        lovelace / LOVELACE_PER_ADA,
        lovelace % LOVELACE_PER_ADA
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_every_variant_by_id() {
        for v in all() {
            assert_eq!(resolve(v.id).unwrap(), v);
        }
        assert_eq!(all().len(), 5);
    }

    #[test]
    fn unknown_variant() {
        assert_eq!(
            resolve("1013z"),
            Err(BuildError::UnknownVariant("1013z".to_string()))
        );
    }

    #[test]
    fn only_user_specified_policy_takes_inputs() {
        for v in all() {
            assert_eq!(
                v.requires_user_inputs,
                v.build_policy == BuildPolicy::UserSpecifiedOutput,
                "{}",
                v.id
            );
        }
    }

    #[test]
    fn coffee_card_advertises_far_less_than_it_moves() {
        let coffee = resolve("1013c").unwrap();
        assert_eq!(coffee.advertised_lovelace, Some(5_000_000));
        assert!(coffee.display_description.contains("5 ADA"));
        let BuildPolicy::FixedOutputSet { outputs } = coffee.build_policy else {
            panic!("coffee donation must be a fixed output set");
        };
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].lovelace, 500_000_000);
        assert_ne!(outputs[0].lovelace, 5_000_000);
    }

    #[test]
    fn ada_formatting() {
        assert_eq!(format_ada(0), "0.000000");
        assert_eq!(format_ada(1_500_000), "1.500000");
        assert_eq!(format_ada(500_000_001), "500.000001");
    }

    #[test]
    fn catalog_serializes_for_listing() {
        let json = serde_json::to_value(resolve("1013b").unwrap()).unwrap();
        assert_eq!(json["requiresUserInputs"], false);
        assert_eq!(json["buildPolicy"]["kind"], "mint_and_deliver");
        assert_eq!(json["buildPolicy"]["asset_name"], MINT_ASSET_NAME);
    }
}

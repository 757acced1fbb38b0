//! Interprets the event logs of a confirmed receipt.
//!
//! Each log is tried against every known event shape in turn. A log that
//! matches none of them (another event, another emitter, malformed data) is
//! simply not one of ours. The first `Result` log decides the outcome; every
//! payout notification becomes its own entry.

use crate::{
    abi::{
        self,
        Address,
        Word,
    },
    chain::{
        Log,
        Receipt,
    },
};

pub const RESULT_EVENT: &str = "Result(address,bool,uint256)";
pub const PRIZE_PAID_EVENT: &str = "PrizePaid(address,uint256)";
pub const PRIZE_PENDING_EVENT: &str = "PrizePending(address,uint256)";
pub const PARAMS_UPDATED_EVENT: &str = "ParamsUpdated(uint256,uint256,uint32)";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LotteryEvent {
    Result {
        player: Address,
        won: bool,
        prize_amount: u128,
    },
    PrizePaid {
        to: Address,
        amount: u128,
    },
    PrizePending {
        to: Address,
        amount: u128,
    },
    ParamsUpdated {
        prize_wei: u128,
        entry_fee_wei: u128,
        win_chance_ppm: u32,
    },
}

impl LotteryEvent {
    pub fn decode(log: &Log) -> Option<Self> {
        let topic0 = log.topics.first()?;
        let words = abi::split_words(&log.data)?;
        if *topic0 == abi::event_topic(RESULT_EVENT) {
            decode_result(&log.topics, &words)
        } else if *topic0 == abi::event_topic(PRIZE_PAID_EVENT) {
            decode_payout(&log.topics, &words)
                .map(|(to, amount)| LotteryEvent::PrizePaid { to, amount })
        } else if *topic0 == abi::event_topic(PRIZE_PENDING_EVENT) {
            decode_payout(&log.topics, &words)
                .map(|(to, amount)| LotteryEvent::PrizePending { to, amount })
        } else if *topic0 == abi::event_topic(PARAMS_UPDATED_EVENT) {
            decode_params(&log.topics, &words)
        } else {
            None
        }
    }
}

fn decode_result(topics: &[Word], words: &[Word]) -> Option<LotteryEvent> {
    let [_, player] = topics else {
        return None;
    };
    let [won, prize] = words else {
        return None;
    };
    Some(LotteryEvent::Result {
        player: Address::from_word(player)?,
        won: abi::word_to_bool(won)?,
        prize_amount: abi::word_to_u128(prize)?,
    })
}

fn decode_payout(topics: &[Word], words: &[Word]) -> Option<(Address, u128)> {
    let [_, to] = topics else {
        return None;
    };
    let [amount] = words else {
        return None;
    };
    Some((Address::from_word(to)?, abi::word_to_u128(amount)?))
}

fn decode_params(topics: &[Word], words: &[Word]) -> Option<LotteryEvent> {
    if topics.len() != 1 {
        return None;
    }
    let [prize, fee, chance] = words else {
        return None;
    };
    Some(LotteryEvent::ParamsUpdated {
        prize_wei: abi::word_to_u128(prize)?,
        entry_fee_wei: abi::word_to_u128(fee)?,
        win_chance_ppm: abi::word_to_u32(chance)?,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionOutcome {
    Won(u128),
    Lost,
    /// Won, but the prize was parked for a later `claim()`.
    PendingEvent(u128),
    Unknown,
}

/// Side notifications that are logged regardless of the outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuxiliaryEvent {
    PrizePaid {
        to: Address,
        amount: u128,
    },
    PrizePending {
        to: Address,
        amount: u128,
    },
    ParamsUpdated {
        prize_wei: u128,
        entry_fee_wei: u128,
        win_chance_ppm: u32,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedReceipt {
    pub outcome: ActionOutcome,
    pub auxiliary: Vec<AuxiliaryEvent>,
}

#[derive(Clone, Copy, Debug)]
pub struct ReceiptDecoder {
    contract: Address,
}

impl ReceiptDecoder {
    pub fn new(contract: Address) -> Self {
        Self { contract }
    }

    pub fn decode(&self, receipt: &Receipt) -> DecodedReceipt {
        let mut first_result: Option<(Address, bool, u128)> = None;
        let mut auxiliary = Vec::new();

        for log in receipt.logs.iter().filter(|l| l.address == self.contract) {
            let Some(event) = LotteryEvent::decode(log) else {
                continue;
            };
            match event {
                LotteryEvent::Result {
                    player,
                    won,
                    prize_amount,
                } => {
                    if first_result.is_none() {
                        first_result = Some((player, won, prize_amount));
                    } else {
                        tracing::debug!(
                            hash = %receipt.transaction_hash,
                            "ignoring additional Result log"
                        );
                    }
                }
                LotteryEvent::PrizePaid { to, amount } => {
                    auxiliary.push(AuxiliaryEvent::PrizePaid { to, amount })
                }
                LotteryEvent::PrizePending { to, amount } => {
                    auxiliary.push(AuxiliaryEvent::PrizePending { to, amount })
                }
                LotteryEvent::ParamsUpdated {
                    prize_wei,
                    entry_fee_wei,
                    win_chance_ppm,
                } => auxiliary.push(AuxiliaryEvent::ParamsUpdated {
                    prize_wei,
                    entry_fee_wei,
                    win_chance_ppm,
                }),
            }
        }

        let outcome = match first_result {
            None => ActionOutcome::Unknown,
            Some((_, false, _)) => ActionOutcome::Lost,
            Some((player, true, prize_amount)) => auxiliary
                .iter()
                .find_map(|aux| match aux {
                    AuxiliaryEvent::PrizePending { to, amount } if *to == player => {
                        Some(ActionOutcome::PendingEvent(*amount))
                    }
                    _ => None,
                })
                .unwrap_or(ActionOutcome::Won(prize_amount)),
        };

        DecodedReceipt { outcome, auxiliary }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use crate::{
        abi::TxHash,
        test_helpers::{
            ReceiptBuilder,
            test_account,
            test_contract,
        },
    };

    fn decoder() -> ReceiptDecoder {
        ReceiptDecoder::new(test_contract())
    }

    fn hash() -> TxHash {
        TxHash([0xab; 32])
    }

    #[test]
    fn decode__pending_then_loss_yields_lost_and_one_auxiliary_entry() {
        // given
        let receipt = ReceiptBuilder::new(hash())
            .prize_pending(test_account(), 5)
            .result(test_account(), false, 0)
            .build();

        // when
        let decoded = decoder().decode(&receipt);

        // then
        assert_eq!(decoded.outcome, ActionOutcome::Lost);
        assert_eq!(
            decoded.auxiliary,
            vec![AuxiliaryEvent::PrizePending {
                to: test_account(),
                amount: 5
            }]
        );
    }

    #[test]
    fn decode__takes_first_result_when_several_are_emitted() {
        // given
        let receipt = ReceiptBuilder::new(hash())
            .result(test_account(), true, 100)
            .result(test_account(), false, 0)
            .build();

        // when
        let decoded = decoder().decode(&receipt);

        // then
        assert_eq!(decoded.outcome, ActionOutcome::Won(100));
        assert!(decoded.auxiliary.is_empty());
    }

    #[test]
    fn decode__no_decodable_logs_is_unknown_not_lost() {
        // given
        let receipt = ReceiptBuilder::new(hash())
            .raw_log(Log {
                address: test_contract(),
                topics: vec![abi::event_topic("Transfer(address,address,uint256)")],
                data: vec![0u8; 32],
            })
            .build();

        // when
        let decoded = decoder().decode(&receipt);

        // then
        assert_eq!(decoded.outcome, ActionOutcome::Unknown);
        assert!(decoded.auxiliary.is_empty());
    }

    #[test]
    fn decode__empty_receipt_is_unknown() {
        let receipt = ReceiptBuilder::new(hash()).build();
        assert_eq!(decoder().decode(&receipt).outcome, ActionOutcome::Unknown);
    }

    #[test]
    fn decode__skips_malformed_result_and_uses_next_valid_one() {
        // given
        let mut bad_won = abi::uint_word(7).to_vec();
        bad_won.extend_from_slice(&abi::uint_word(1));
        let receipt = ReceiptBuilder::new(hash())
            .raw_log(Log {
                address: test_contract(),
                topics: vec![abi::event_topic(RESULT_EVENT), test_account().to_word()],
                data: bad_won,
            })
            .result(test_account(), false, 0)
            .build();

        // when
        let decoded = decoder().decode(&receipt);

        // then
        assert_eq!(decoded.outcome, ActionOutcome::Lost);
    }

    #[test]
    fn decode__ignores_logs_from_other_emitters() {
        // given
        let receipt = ReceiptBuilder::new(hash())
            .emitted_by(Address([0x99; 20]))
            .result(test_account(), true, 100)
            .build();

        // when
        let decoded = decoder().decode(&receipt);

        // then
        assert_eq!(decoded.outcome, ActionOutcome::Unknown);
    }

    #[test]
    fn decode__records_every_payout_without_a_result() {
        // given
        let receipt = ReceiptBuilder::new(hash())
            .prize_paid(test_account(), 3)
            .prize_paid(test_account(), 4)
            .build();

        // when
        let decoded = decoder().decode(&receipt);

        // then
        assert_eq!(decoded.outcome, ActionOutcome::Unknown);
        assert_eq!(decoded.auxiliary.len(), 2);
    }

    #[test]
    fn decode__win_with_pending_prize_for_player_is_pending_event() {
        // given
        let receipt = ReceiptBuilder::new(hash())
            .result(test_account(), true, 100)
            .prize_pending(test_account(), 100)
            .build();

        // when
        let decoded = decoder().decode(&receipt);

        // then
        assert_eq!(decoded.outcome, ActionOutcome::PendingEvent(100));
        assert_eq!(decoded.auxiliary.len(), 1);
    }

    #[test]
    fn decode__win_with_paid_prize_stays_won() {
        let receipt = ReceiptBuilder::new(hash())
            .result(test_account(), true, 100)
            .prize_paid(test_account(), 100)
            .build();
        let decoded = decoder().decode(&receipt);
        assert_eq!(decoded.outcome, ActionOutcome::Won(100));
        assert_eq!(decoded.auxiliary.len(), 1);
    }

    #[test]
    fn decode__params_updated_is_auxiliary() {
        let receipt = ReceiptBuilder::new(hash())
            .params_updated(1_000, 10, 50_000)
            .build();
        let decoded = decoder().decode(&receipt);
        assert_eq!(decoded.outcome, ActionOutcome::Unknown);
        assert_eq!(
            decoded.auxiliary,
            vec![AuxiliaryEvent::ParamsUpdated {
                prize_wei: 1_000,
                entry_fee_wei: 10,
                win_chance_ppm: 50_000
            }]
        );
    }

    #[test]
    fn lottery_event_decode__rejects_missing_indexed_topic() {
        let log = Log {
            address: test_contract(),
            topics: vec![abi::event_topic(PRIZE_PAID_EVENT)],
            data: abi::uint_word(5).to_vec(),
        };
        assert_eq!(LotteryEvent::decode(&log), None);
    }
}

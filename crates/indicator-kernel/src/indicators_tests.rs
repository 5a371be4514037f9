#[cfg(test)]
mod tests {
    use super::super::indicators::*;
    use super::super::recipe::{self, IndicatorSpec, Recipe};
    use super::super::settings::IndicatorSettings;
    use chrono::{TimeZone, Utc};
    use market_core::{Bar, Frame, Interval};

    // Helper function to create sample price data
    fn sample_prices() -> Vec<f64> {
        vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08,
            45.89, 46.03, 45.61, 46.28, 46.28, 46.00, 46.03, 46.41, 46.22, 45.64,
        ]
    }

    fn make_bars(data: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
        data.iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| Bar {
                timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
                    + chrono::Duration::hours(i as i64),
                open,
                high,
                low,
                close,
                volume: 1_000_000.0,
            })
            .collect()
    }

    fn trending_bars(n: usize) -> Vec<Bar> {
        let data: Vec<(f64, f64, f64, f64)> = (0..n)
            .map(|i| {
                let base = 100.0 + i as f64;
                (base, base + 2.0, base - 2.0, base + 1.0)
            })
            .collect();
        make_bars(&data)
    }

    fn flat_bars(n: usize) -> Vec<Bar> {
        make_bars(&vec![(100.0, 100.0, 100.0, 100.0); n])
    }

    #[test]
    fn test_sma_alignment() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = sma(&data, 3);

        assert_eq!(result.len(), data.len());
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert!((result[2] - 2.0).abs() < 1e-9); // (1+2+3)/3
        assert!((result[3] - 3.0).abs() < 1e-9);
        assert!((result[4] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_sma_insufficient_data() {
        let result = sma(&[1.0, 2.0], 5);
        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_ema_seeded_with_sma() {
        let data = vec![22.0, 24.0, 23.0, 25.0, 26.0];
        let result = ema(&data, 3);

        assert_eq!(result.len(), data.len());
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        let seed = (22.0 + 24.0 + 23.0) / 3.0;
        assert!((result[2] - seed).abs() < 1e-9);
        // multiplier = 0.5 for period 3
        assert!((result[3] - ((25.0 - seed) * 0.5 + seed)).abs() < 1e-9);
    }

    #[test]
    fn test_ema_skips_leading_nans() {
        let data = vec![f64::NAN, f64::NAN, 10.0, 11.0, 12.0, 13.0];
        let result = ema(&data, 3);

        assert!(result[3].is_nan());
        assert!((result[4] - 11.0).abs() < 1e-9); // SMA(10,11,12)
        assert!(result[5].is_finite());
    }

    #[test]
    fn test_rsi_range_and_warmup() {
        let prices = sample_prices();
        let result = rsi(&prices, 14);

        assert_eq!(result.len(), prices.len());
        for v in &result[..14] {
            assert!(v.is_nan());
        }
        for v in &result[14..] {
            assert!(*v >= 0.0 && *v <= 100.0);
        }
    }

    #[test]
    fn test_rsi_pure_uptrend_is_overbought() {
        let prices: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let result = rsi(&prices, 14);
        assert!((result.last().unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_stochastic_range() {
        let bars = trending_bars(30);
        let stoch = stochastic(&bars, 14, 3, 3);

        assert_eq!(stoch.k.len(), bars.len());
        assert_eq!(stoch.d.len(), bars.len());
        for v in stoch.k.iter().chain(stoch.d.iter()) {
            if v.is_finite() {
                assert!(*v >= 0.0 && *v <= 100.0);
            }
        }
        // %D lags %K by its SMA warmup
        assert!(stoch.k[15].is_finite());
        assert!(stoch.d.last().unwrap().is_finite());
    }

    #[test]
    fn test_williams_r_range() {
        let bars = trending_bars(30);
        let result = williams_r(&bars, 14);

        for v in result.iter().filter(|v| v.is_finite()) {
            assert!(*v >= -100.0 && *v <= 0.0);
        }
        // Consistent uptrend closes near the top of the range
        assert!(*result.last().unwrap() > -30.0);
    }

    #[test]
    fn test_cci_flat_window_is_zero() {
        let bars = flat_bars(25);
        let result = cci(&bars, 20);
        assert!((result.last().unwrap() - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_macd_histogram_is_line_minus_signal() {
        let prices: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let result = macd(&prices, 12, 26, 9);

        assert_eq!(result.macd_line.len(), prices.len());
        for i in 0..prices.len() {
            if result.histogram[i].is_finite() {
                let expected = result.macd_line[i] - result.signal_line[i];
                assert!((result.histogram[i] - expected).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_atr_non_negative_and_flat_zero() {
        let bars = trending_bars(40);
        let result = atr(&bars, 14);
        for v in result.iter().filter(|v| v.is_finite()) {
            assert!(*v >= 0.0);
        }

        let flat = flat_bars(40);
        let flat_atr = atr(&flat, 14);
        assert!((flat_atr.last().unwrap() - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_adx_range_and_warmup() {
        let bars = trending_bars(60);
        let result = adx(&bars, 14);

        assert_eq!(result.adx.len(), bars.len());
        for i in 0..(2 * 14) {
            assert!(result.adx[i].is_nan());
        }
        for v in result
            .adx
            .iter()
            .chain(result.plus_di.iter())
            .chain(result.minus_di.iter())
            .filter(|v| v.is_finite())
        {
            assert!(*v >= 0.0 && *v <= 100.0);
        }
    }

    #[test]
    fn test_supertrend_initialization() {
        let bars = trending_bars(10);
        let st = supertrend(&bars, 6, 0.66);

        assert_eq!(st.direction[0], 1);
        assert_eq!(st.value[0], 0.0);
    }

    #[test]
    fn test_supertrend_direction_domain_and_band_side() {
        let bars = trending_bars(40);
        let st = supertrend(&bars, 15, 3.142);

        for (i, dir) in st.direction.iter().enumerate() {
            assert!(*dir == 1 || *dir == -1);
            if i > 0 {
                if *dir == 1 {
                    // Trending up rides the lower band
                    assert!(st.value[i] <= (bars[i].high + bars[i].low) / 2.0);
                } else {
                    assert!(st.value[i] >= (bars[i].high + bars[i].low) / 2.0);
                }
            }
        }
    }

    #[test]
    fn test_supertrend_flips_on_breakdown() {
        // Stable range around 100, then a collapse far below the lower band
        let mut data: Vec<(f64, f64, f64, f64)> = (0..20)
            .map(|_| (100.0, 101.0, 99.0, 100.0))
            .collect();
        data.push((60.0, 61.0, 59.0, 60.0));
        data.push((60.0, 61.0, 59.0, 60.0));
        let bars = make_bars(&data);

        let st = supertrend(&bars, 6, 1.0);
        assert_eq!(st.direction[19], 1);
        assert_eq!(st.direction[20], -1);
        // In a downtrend the indicator sits above price
        assert!(st.value[20] > bars[20].close);
    }

    #[test]
    fn test_supertrend_flat_market_keeps_direction() {
        let bars = flat_bars(50);
        let st = supertrend(&bars, 15, 3.0);

        assert!(st.direction.iter().all(|d| *d == 1));
        // Zero ATR collapses both bands onto hl2
        for i in 1..st.value.len() {
            assert!((st.value[i] - 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_kernel_compute_is_deterministic() {
        let frame = Frame::new("EURUSD", Interval::Hour1, trending_bars(80)).unwrap();
        let recipe = IndicatorSettings::default()
            .standard_recipe()
            .with(IndicatorSpec::Supertrend {
                label: "a".to_string(),
                period: 15,
                multiplier: 3.142,
            });

        let first = recipe::compute(&frame, &recipe).unwrap();
        let second = recipe::compute(&frame, &recipe).unwrap();

        // Bit-identical across runs, NaN warmups included
        let names: Vec<_> = first.series_names().collect();
        assert_eq!(names, second.series_names().collect::<Vec<_>>());
        for name in names {
            let a = first.series(name).unwrap();
            let b = second.series(name).unwrap();
            assert_eq!(a.len(), b.len());
            for (x, y) in a.iter().zip(b.iter()) {
                assert_eq!(x.to_bits(), y.to_bits(), "series {name} diverged");
            }
        }
        assert_eq!(first.recipe(), &recipe);
    }

    #[test]
    fn test_kernel_short_history_never_short_circuits() {
        let frame = Frame::new("EURUSD", Interval::Hour1, trending_bars(10)).unwrap();
        let result =
            recipe::compute(&frame, &IndicatorSettings::default().standard_recipe()).unwrap();

        // Every family still reports a frame-length series, NaN warmup or not
        for name in ["rsi", "stoch_k", "macd", "adx", "bb_upper", "atr"] {
            let series = result.series(name).unwrap();
            assert_eq!(series.len(), 10);
        }
        assert!(result.series("adx").unwrap().iter().all(|v| v.is_nan()));
        assert_eq!(result.latest("adx"), None);
    }

    #[test]
    fn test_kernel_supertrend_labels() {
        let frame = Frame::new("EURUSD", Interval::Hour1, trending_bars(30)).unwrap();
        let recipe = Recipe::new()
            .with(IndicatorSpec::Supertrend {
                label: "a".to_string(),
                period: 15,
                multiplier: 3.142,
            })
            .with(IndicatorSpec::Supertrend {
                label: "b".to_string(),
                period: 6,
                multiplier: 0.66,
            });

        let result = recipe::compute(&frame, &recipe).unwrap();
        assert!(result.series("st_a_value").is_some());
        assert!(result.series("st_a_direction").is_some());
        assert!(result.series("st_b_value").is_some());
        assert!(result.series("st_b_direction").is_some());
    }
}

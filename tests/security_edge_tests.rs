//! Security and edge case tests
//! Hostile handles, boundary sizes and service state after bad input

use bufferhub::{
    error::BufferHubStatus, BufferHubService, BufferInfo, HardwareBufferDescription,
    HubConfig, NativeHandle, PixelFormat, TOKEN_NUM_INTS,
};

fn hub() -> BufferHubService {
    BufferHubService::new(HubConfig::default()).unwrap()
}

#[cfg(test)]
mod security_edge_tests {
    use super::*;

    #[test]
    fn test_guessing_tokens_fails() {
        let hub = hub();
        let (client, _) = hub.allocate_buffer(
            &HardwareBufferDescription::new(32, 32, 1, PixelFormat::R8G8B8A8Unorm, 0),
            0,
        )
        .unwrap();
        let _pending = client.duplicate().unwrap();

        // Small sequential ids with zero and patterned tags
        for id in 0..256 {
            for fill in [0i32, -1, id] {
                let mut ints = vec![fill; TOKEN_NUM_INTS];
                ints[0] = id;
                let result = hub.import_buffer(Some(&NativeHandle::from_ints(ints)));
                assert_eq!(BufferHubStatus::from_result(&result), BufferHubStatus::InvalidToken);
            }
        }

        assert_eq!(hub.live_client_count(), 1);
        assert_eq!(hub.pending_token_count(), 1);
    }

    #[test]
    fn test_buffer_handle_is_not_a_token() {
        let hub = hub();
        let (_client, traits) = hub
            .allocate_buffer(
                &HardwareBufferDescription::new(16, 16, 1, PixelFormat::R8G8B8A8Unorm, 0),
                8,
            )
            .unwrap();

        for handle in [traits.buffer_handle.clone(), traits.info_handle()] {
            let result = hub.import_buffer(Some(&handle));
            assert_eq!(BufferHubStatus::from_result(&result), BufferHubStatus::InvalidToken);
        }
    }

    #[test]
    fn test_hostile_info_handles_rejected() {
        let too_many_fds = NativeHandle::new(vec![1, 2, 3], vec![1, 1, 0]);
        assert!(BufferInfo::from_handle(&too_many_fds).is_err());

        let empty = NativeHandle::default();
        assert!(BufferInfo::from_handle(&empty).is_err());

        let no_bits = NativeHandle::from_ints(vec![1, 0, 0]);
        assert!(BufferInfo::from_handle(&no_bits).is_err());
    }

    #[test]
    fn test_oversized_requests_fail_cleanly() {
        let hub = hub();

        let huge = HardwareBufferDescription::new(u32::MAX, u32::MAX, u32::MAX, PixelFormat::R16G16B16A16Float, 0);
        let result = hub.allocate_buffer(&huge, 0);
        assert_eq!(BufferHubStatus::from_result(&result), BufferHubStatus::AllocationFailed);

        let ok = HardwareBufferDescription::new(4, 4, 1, PixelFormat::R8G8B8A8Unorm, 0);
        let result = hub.allocate_buffer(&ok, u32::MAX);
        assert_eq!(BufferHubStatus::from_result(&result), BufferHubStatus::AllocationFailed);

        // The service keeps working after rejected requests
        assert!(hub.allocate_buffer(&ok, 0).is_ok());
    }

    #[test]
    fn test_blob_buffers() {
        let hub = hub();
        let blob = HardwareBufferDescription::new(4096, 1, 1, PixelFormat::Blob, 0x100);
        let (_client, traits) = hub.allocate_buffer(&blob, 0).unwrap();
        assert!(traits.description.matches_request(&blob));
        assert!(traits.description.stride >= 4096);
    }

    #[test]
    fn test_metadata_bounds_overflow() {
        let hub = hub();
        let (client, _) = hub
            .allocate_buffer(
                &HardwareBufferDescription::new(4, 4, 1, PixelFormat::R8G8B8A8Unorm, 0),
                16,
            )
            .unwrap();

        assert!(client.write_user_metadata(usize::MAX, b"x").is_err());
        assert!(client.read_user_metadata(1, usize::MAX).is_err());
        assert!(client.write_user_metadata(16, b"").is_ok());
    }

    #[test]
    fn test_rejections_are_counted_without_detail() {
        let hub = hub();
        let attempts = [
            hub.import_buffer(None),
            hub.import_buffer(Some(&NativeHandle::from_ints(vec![7]))),
            hub.import_buffer(Some(&NativeHandle::from_ints(vec![7; TOKEN_NUM_INTS]))),
        ];

        for result in &attempts {
            let err = result.as_ref().unwrap_err();
            assert_eq!(err.to_string(), "Invalid token");
        }
        assert_eq!(hub.stats().import_rejections, 3);
        assert_eq!(hub.stats().imports, 0);
    }
}
